//! Security middleware for HTTP requests.
//!
//! This module provides middleware for:
//! - Cookie signature verification
//! - CORS (Cross-Origin Resource Sharing) configuration
//! - Security response headers (HSTS, X-Frame-Options, etc.)

mod cors;
mod headers_config;
mod signed_cookies;

pub use cors::CorsConfig;
pub use headers_config::{FrameOptions, ReferrerPolicy, SecurityHeaders, SecurityHeadersConfig};
pub use signed_cookies::{CookieConfig, SignedCookies, verify_signed_cookies};
