//! Prelude module for bastion-server.
//!
//! This module re-exports the most commonly used types and traits from bastion-server,
//! making it easy to import everything you need with a single `use` statement.
//!
//! # Example
//!
//! ```rust
//! use bastion_server::prelude::*;
//! ```

// Re-export the bootstrap entry points
pub use crate::bootstrap::{
    Bootstrap, BootstrapStage, MountContext, RouteRegistrar, ServerInstance, StartupFailure,
    start,
};
// Re-export extractor types
pub use crate::extract::*;
// Re-export handler error types
pub use crate::handler::{Error as HttpError, ErrorKind as HttpErrorKind};
// Re-export route-level middleware
pub use crate::middleware::RouteRateLimit;
// Re-export service types
pub use crate::service::*;
pub use crate::{API_PREFIX, Error, ErrorKind, Result};
