use async_trait::async_trait;

use crate::{domain::SenderId, Result};

/// Outbound reply port (group chat, app message, stdout, ...).
#[async_trait]
pub trait ReplyPort: Send + Sync {
    async fn send_text(&self, to: &SenderId, text: &str) -> Result<()>;
}
