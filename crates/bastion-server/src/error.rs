//! Startup error types and utilities.
//!
//! Errors in this module describe failures while assembling the server:
//! invalid configuration, a registration step that could not complete, or
//! an injected dependency that did not report ready. Request-scoped failures
//! use [`crate::handler::Error`] instead.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// Type alias for boxed errors that are Send + Sync.
///
/// Injected collaborators ([`DataStore`], [`MailService`]) report their
/// failures through this type.
///
/// [`DataStore`]: crate::service::DataStore
/// [`MailService`]: crate::service::MailService
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for startup operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing startup errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed configuration.
    Config,
    /// A middleware or route registration could not complete.
    Registration,
    /// An injected dependency failed its readiness probe.
    Dependency,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorKind {
    /// Returns the error kind as a string for categorization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Registration => "registration",
            Self::Dependency => "dependency",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Startup error with structured information.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    /// Creates a new [`Error`].
    #[inline]
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error to this error.
    #[inline]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attaches an already boxed source error to this error.
    #[inline]
    pub fn with_boxed_source(mut self, source: BoxedError) -> Self {
        self.source = Some(source);
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a new configuration error.
    #[inline]
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Creates a new registration error.
    #[inline]
    pub fn registration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Registration, message)
    }

    /// Creates a new dependency error naming the failing collaborator.
    #[inline]
    pub fn dependency(
        dependency: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        let full_message = format!("{}: {}", dependency.into(), message.into());
        Self::new(ErrorKind::Dependency, full_message)
    }

    /// Creates a new internal error.
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}
