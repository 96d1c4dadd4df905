//! Request extractors with structured error handling and validation.
//!
//! - [`Json`] - JSON deserialization with detailed rejections and checked encoding
//! - [`ValidateJson`] - JSON extraction with automatic validation
//! - [`ClientIp`] - the client address resolved from trusted proxy headers

mod client_ip;
pub mod reject;

pub use crate::extract::client_ip::ClientIp;
pub use crate::extract::reject::{Json, ValidateJson};
