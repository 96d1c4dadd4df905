//! Application state, collaborators and dependency injection.

mod config;
mod mail;
mod security;
mod store;

use std::fmt;
use std::sync::Arc;

use axum_extra::extract::cookie::Key;

pub use crate::service::config::ConfigBundle;
pub use crate::service::mail::{LogMailer, MailMessage, MailService};
pub use crate::service::security::{
    RateLimitConfig, RateLimitKey, RateLimitPolicy, RateLimitStatus, RateLimiter,
};
pub use crate::service::store::{DataStore, MemoryStore};

/// Externally owned collaborators handed to [`start`].
///
/// The server borrows them for readiness probing and route mounting and
/// never shuts them down.
///
/// [`start`]: crate::bootstrap::start
#[derive(Clone)]
pub struct Dependencies {
    data_store: Arc<dyn DataStore>,
    mailer: Arc<dyn MailService>,
    span: Option<tracing::Span>,
}

impl Dependencies {
    /// Creates a dependency set from owned collaborators.
    pub fn new(data_store: impl DataStore + 'static, mailer: impl MailService + 'static) -> Self {
        Self::from_shared(Arc::new(data_store), Arc::new(mailer))
    }

    /// Creates a dependency set from already shared collaborators.
    pub fn from_shared(data_store: Arc<dyn DataStore>, mailer: Arc<dyn MailService>) -> Self {
        Self {
            data_store,
            mailer,
            span: None,
        }
    }

    /// Runs startup inside `span` instead of a fresh `bootstrap` span.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Returns the data store handle.
    pub fn data_store(&self) -> &Arc<dyn DataStore> {
        &self.data_store
    }

    /// Returns the mail service handle.
    pub fn mailer(&self) -> &Arc<dyn MailService> {
        &self.mailer
    }

    /// Returns the caller-supplied span, if any.
    pub fn span(&self) -> Option<&tracing::Span> {
        self.span.as_ref()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("data_store", &self.data_store.name())
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct AppState {
    data_store: Arc<dyn DataStore>,
    mailer: Arc<dyn MailService>,
    cookie_key: Key,
    config: Arc<ConfigBundle>,
}

impl AppState {
    /// Assembles the state shared by every mounted route.
    pub fn new(dependencies: &Dependencies, cookie_key: Key, config: Arc<ConfigBundle>) -> Self {
        Self {
            data_store: dependencies.data_store.clone(),
            mailer: dependencies.mailer.clone(),
            cookie_key,
            config,
        }
    }

    /// Returns the data store handle.
    pub fn data_store(&self) -> &Arc<dyn DataStore> {
        &self.data_store
    }

    /// Returns the mail service handle.
    pub fn mailer(&self) -> &Arc<dyn MailService> {
        &self.mailer
    }

    /// Returns the validated configuration.
    pub fn config(&self) -> &ConfigBundle {
        &self.config
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<AppState> for $t {
            fn from_ref(state: &AppState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(data_store: Arc<dyn DataStore>);
impl_di!(mailer: Arc<dyn MailService>);
impl_di!(cookie_key: Key);
impl_di!(config: Arc<ConfigBundle>);
