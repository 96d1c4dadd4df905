//! Body extractors that reject with structured JSON errors.
//!
//! These are drop-in replacements for [`axum::Json`]: failures produce the
//! same error body as every other error of the server.

mod json;
mod validated_json;

pub use self::json::Json;
pub use self::validated_json::ValidateJson;
