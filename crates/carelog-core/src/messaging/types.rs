use crate::domain::SenderId;

/// A decrypted, verified text message handed over by the transport adapter.
#[derive(Clone, Debug)]
pub struct IncomingText {
    pub sender: SenderId,
    pub text: String,
}

impl IncomingText {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: SenderId(sender.into()),
            text: text.into(),
        }
    }
}
