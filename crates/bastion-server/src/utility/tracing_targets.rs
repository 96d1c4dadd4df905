//! Centralized tracing target constants for structured logging.
//!
//! Using consistent targets enables fine-grained control over log output
//! via tracing subscriber filters, e.g. `RUST_LOG=bastion_server::bootstrap=debug`.

/// Startup sequence: stage transitions, readiness probes and failures.
pub const TRACING_TARGET_BOOTSTRAP: &str = "bastion_server::bootstrap";

/// Signed cookie verification.
pub const TRACING_TARGET_COOKIES: &str = "bastion_server::cookies";

/// Client address resolution from proxy headers.
pub const TRACING_TARGET_CLIENT_IP: &str = "bastion_server::client_ip";

/// Rate limiter decisions and window eviction.
pub const TRACING_TARGET_RATE_LIMIT: &str = "bastion_server::rate_limit";

/// Request parsing and response encoding.
pub const TRACING_TARGET_SCHEMA: &str = "bastion_server::schema";

/// OpenAPI document generation and publishing.
pub const TRACING_TARGET_OPENAPI: &str = "bastion_server::openapi";

/// Panic recovery including handler panics.
pub const TRACING_TARGET_RECOVERY_PANIC: &str = "bastion_server::recovery::panic";
