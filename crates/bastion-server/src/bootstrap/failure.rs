use crate::Error;
use crate::bootstrap::BootstrapStage;

/// Startup aborted; no server was produced.
#[derive(Debug, thiserror::Error)]
#[error("startup failed at {stage}: {error}")]
#[must_use = "startup failures should be reported"]
pub struct StartupFailure {
    stage: BootstrapStage,
    #[source]
    error: Error,
}

impl StartupFailure {
    /// Creates a failure for the given stage.
    pub fn new(stage: BootstrapStage, error: Error) -> Self {
        Self { stage, error }
    }

    /// Returns the stage that failed.
    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    /// Returns the underlying error.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Consumes the failure, returning the underlying error.
    pub fn into_error(self) -> Error {
        self.error
    }
}
