//! Gate error types
//!
//! Every variant here is raised before any script code runs. Failures of the
//! script itself are not errors of the gate; they come back as
//! [`super::ExecOutcome::Failed`].

use std::path::PathBuf;
use thiserror::Error;

use crate::resolver::ResolutionError;

#[derive(Error, Debug)]
pub enum GateError {
    /// The script file does not exist
    #[error("File not found. ({})", path.display())]
    NotFound { path: PathBuf },

    /// The script does not carry the engine's extension
    #[error("File extension not supported. ({}) Expected a .{expected} script.", path.display())]
    UnsupportedInput { path: PathBuf, expected: String },

    /// Certificate missing or unusable, or the signature does not verify
    #[error("Security violation: {reason}")]
    SecurityViolation { reason: String },

    /// A manifest entry could not be loaded
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// An existing input could not be read
    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GateError {
    pub(crate) fn security(reason: impl Into<String>) -> Self {
        GateError::SecurityViolation {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GateError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short name of the failure class, for logs and front ends
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::NotFound { .. } => "NotFound",
            GateError::UnsupportedInput { .. } => "UnsupportedInput",
            GateError::SecurityViolation { .. } => "SecurityViolation",
            GateError::Resolution(_) => "ResolutionError",
            GateError::Io { .. } => "IoError",
        }
    }
}
