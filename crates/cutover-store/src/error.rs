//! Storage error types.

/// Error type for snapshot and artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The on-disk snapshot cannot be parsed or migrated. The process
    /// must refuse to start rather than risk partial writes.
    #[error("Storage corruption: {message}")]
    Corruption { message: String },

    #[error("Artifact error: {message}")]
    Artifact { message: String },

    #[error("Run {run_id} not found in snapshot")]
    RunNotFound { run_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Create a new corruption error.
    pub fn corruption<S: Into<String>>(message: S) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Create a new artifact-registry error.
    pub fn artifact<S: Into<String>>(message: S) -> Self {
        Self::Artifact {
            message: message.into(),
        }
    }

    /// Create a new run-not-found error.
    pub fn run_not_found<S: Into<String>>(run_id: S) -> Self {
        Self::RunNotFound {
            run_id: run_id.into(),
        }
    }
}

/// Convenience result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
