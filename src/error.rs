//! Terminal error taxonomy for a somnosync run.
//!
//! Every failure is terminal: the run logs it and exits with the matching
//! process exit code. There is no retry path anywhere in the pipeline.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Settings source absent, or a required key missing/blank.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Filesystem permission problem (directories, credential cache, logs).
    #[error("permission denied: {0}")]
    Permission(String),

    /// A required external tool is not resolvable on PATH.
    #[error("required tool not found: {0}")]
    MissingTool(String),

    /// The sync remote could not be inspected or registered.
    #[error("remote configuration failed: {0}")]
    RemoteConfiguration(String),

    /// The prior-calendar-day date could not be computed.
    #[error("date computation failed: {0}")]
    DateComputation(String),

    /// Token exchange or credential cache handling failed.
    #[error("token error: {0}")]
    Token(String),

    /// An upload API call returned HTTP >= 400. The response body is kept
    /// verbatim so the operator can see what the server objected to.
    #[error("upload failed with status {status}: {body}")]
    Upload { status: u16, body: String },

    /// Anything else that aborts the run.
    #[error("{0}")]
    Failure(String),
}

impl RunError {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Upload { .. } | RunError::Failure(_) => 1,
            RunError::ConfigurationMissing(_) => 2,
            RunError::Permission(_) => 3,
            RunError::MissingTool(_) => 4,
            RunError::RemoteConfiguration(_) => 5,
            RunError::DateComputation(_) => 6,
            RunError::Token(_) => 7,
        }
    }

    /// Classify an I/O error: permission problems get their own exit code,
    /// everything else is a generic failure.
    pub(crate) fn from_io(context: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            RunError::Permission(format!("{context}: {err}"))
        } else {
            RunError::Failure(format!("{context}: {err}"))
        }
    }
}
