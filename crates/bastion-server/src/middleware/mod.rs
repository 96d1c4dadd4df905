//! Middleware for `axum::Router` and HTTP request processing.
//!
//! This module provides the cross-cutting behaviors attached during startup:
//! - Security (signed cookies, CORS, security headers)
//! - Client address resolution from trusted proxy headers
//! - Rate limiting keyed by the resolved client address
//! - Request body limits and OpenAPI generation rules
//! - OpenAPI documentation with Scalar UI
//! - Observability (tracing, request ids) and panic recovery
//!
//! The bootstrap pipeline attaches these in a fixed order; the extension
//! traits are exported for routers assembled by hand, e.g. in tests.

mod client_ip;
mod observability;
mod open_api;
mod rate_limiting;
mod recovery;
mod schema;
pub mod security;

pub use client_ip::{ClientIpResolver, ProxyConfig, ProxyHeader, resolve_client_ip};
pub use observability::RouterObservabilityExt;
pub use open_api::{DocsPublisher, OpenApiConfig};
pub use rate_limiting::{RouteRateLimit, rate_limit_by_ip};
pub use recovery::RouterRecoveryExt;
pub use schema::{SchemaAdapter, SchemaConfig};
pub use security::{
    CookieConfig, CorsConfig, FrameOptions, ReferrerPolicy, SecurityHeaders,
    SecurityHeadersConfig, SignedCookies, verify_signed_cookies,
};
