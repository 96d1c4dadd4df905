//! Request parsing and response encoding rules shared by every route.
//!
//! Handlers declare their bodies with [`Json`] or [`ValidateJson`] over types
//! deriving [`schemars::JsonSchema`]. The [`SchemaAdapter`] installs the
//! server-wide parts: the body size ceiling applied before extraction and
//! the rules aide uses to turn those types into documented operations.
//!
//! [`Json`]: crate::extract::Json
//! [`ValidateJson`]: crate::extract::ValidateJson

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::DefaultBodyLimit;
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::utility::TRACING_TARGET_SCHEMA;
use crate::{Error, Result};

/// Default maximum request body size, 1 MiB.
const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Request body parsing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct SchemaConfig {
    /// Maximum request body size in bytes.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "MAX_BODY_SIZE", default_value = "1048576")
    )]
    pub max_body_size: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl SchemaConfig {
    /// Validates the body size ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.max_body_size == 0 {
            return Err(Error::config("maximum body size must be greater than zero"));
        }

        Ok(())
    }
}

/// Server-wide validation and serialization rules.
#[derive(Debug, Clone)]
pub struct SchemaAdapter {
    max_body_size: usize,
    generation_errors: Arc<AtomicUsize>,
}

impl SchemaAdapter {
    /// Creates the adapter from validated configuration.
    pub fn new(config: &SchemaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_body_size: config.max_body_size,
            generation_errors: Arc::default(),
        })
    }

    /// Returns the maximum request body size in bytes.
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Returns how many documentation errors were reported so far.
    pub fn generation_errors(&self) -> usize {
        self.generation_errors.load(Ordering::Relaxed)
    }

    /// Configures OpenAPI generation for the current thread.
    ///
    /// aide keeps these settings per thread and applies them when a route is
    /// registered, so this runs before routes are built and again before the
    /// document is finalized, on the thread doing the work.
    pub fn configure_generation(&self) {
        let generation_errors = self.generation_errors.clone();

        aide::generate::infer_responses(true);
        aide::generate::extract_schemas(true);
        aide::generate::on_error(move |error| {
            generation_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: TRACING_TARGET_SCHEMA,
                error = %error,
                "operation documentation is incomplete"
            );
        });
    }

    /// Layers the body size ceiling onto the router.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(DefaultBodyLimit::max(self.max_body_size))
    }
}
