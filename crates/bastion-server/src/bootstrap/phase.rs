//! Typestate markers for [`Bootstrap`].
//!
//! Each marker carries what the next stages still need, so a stage's
//! operation only exists once every earlier stage has completed.
//!
//! [`Bootstrap`]: crate::bootstrap::Bootstrap

use std::fmt;

use aide::axum::ApiRouter;
use axum_extra::extract::cookie::Key;

use crate::middleware::{DocsPublisher, SchemaAdapter};
use crate::service::AppState;

/// State carried through the security registrations.
#[derive(Clone)]
pub(crate) struct Prepared {
    pub(crate) schema: SchemaAdapter,
    pub(crate) cookie_key: Key,
}

impl fmt::Debug for Prepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prepared")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Configuration validated; nothing attached yet.
#[derive(Debug)]
pub struct Configured;

/// Validation and serialization rules installed.
#[derive(Debug)]
pub struct SchemaInstalled {
    pub(crate) schema: SchemaAdapter,
}

/// Cookie signing registered.
#[derive(Debug)]
pub struct CookiesSigned {
    pub(crate) prepared: Prepared,
}

/// Cross-origin policy registered.
#[derive(Debug)]
pub struct CorsApplied {
    pub(crate) prepared: Prepared,
}

/// Client address resolution registered.
#[derive(Debug)]
pub struct ClientIpResolved {
    pub(crate) prepared: Prepared,
}

/// Documentation routes reserved.
#[derive(Debug)]
pub struct Documented {
    pub(crate) prepared: Prepared,
    pub(crate) docs: DocsPublisher,
}

/// Global rate limit registered.
#[derive(Debug)]
pub struct RateLimited {
    pub(crate) prepared: Prepared,
    pub(crate) docs: DocsPublisher,
}

/// Security headers registered.
#[derive(Debug)]
pub struct Secured {
    pub(crate) prepared: Prepared,
    pub(crate) docs: DocsPublisher,
}

/// Route trees mounted; waiting for readiness.
pub struct Mounted {
    pub(crate) schema: SchemaAdapter,
    pub(crate) docs: DocsPublisher,
    pub(crate) api: ApiRouter<AppState>,
    pub(crate) state: AppState,
}
