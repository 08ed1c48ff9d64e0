//! Chat-platform abstractions. Transport, signature checks and decryption
//! happen in adapters; the core only sees decrypted text.

pub mod port;
pub mod types;
