//! Core error taxonomy.
//!
//! Stages never throw across the orchestrator boundary; they return
//! results carrying these kinds, and the orchestrator converts them to
//! log artifacts and state transitions. The REST layer maps kinds to
//! HTTP codes.

/// Core error type for all control-plane operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request breached a model invariant. 400 at the boundary.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// An id did not resolve. 404 at the boundary.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The operation conflicts with current state. 409 at the boundary.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// A stage's I/O failed; its slot is marked unavailable and the
    /// run continues.
    #[error("{stage} stage error: {message}")]
    StageTransient { stage: String, message: String },

    /// Crawl or Capture failed hard, or Report failed; the run ends.
    #[error("{stage} stage failed: {message}")]
    StageFatal { stage: String, message: String },

    /// The snapshot cannot be parsed or migrated.
    #[error("Storage corruption: {message}")]
    StorageCorruption { message: String },

    /// Explicit cancellation or timeout.
    #[error("Cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Storage error: {0}")]
    Storage(cutover_store::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] cutover_browser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Create a new invalid-input error.
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new not-found error.
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new conflict error.
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new transient stage error.
    pub fn transient<S: Into<String>, M: Into<String>>(stage: S, message: M) -> Self {
        Self::StageTransient {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a new fatal stage error.
    pub fn fatal<S: Into<String>, M: Into<String>>(stage: S, message: M) -> Self {
        Self::StageFatal {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a new cancellation error.
    pub fn cancelled<S: Into<String>>(reason: S) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// The short human-readable message for the boundary.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<cutover_rest_api_contract::ContractError> for Error {
    fn from(err: cutover_rest_api_contract::ContractError) -> Self {
        Self::invalid_input(err.message())
    }
}

impl From<cutover_store::Error> for Error {
    fn from(err: cutover_store::Error) -> Self {
        match err {
            cutover_store::Error::Corruption { message } => Self::StorageCorruption { message },
            other => Self::Storage(other),
        }
    }
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
