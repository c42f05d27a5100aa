//! Browser driver error types.

/// Error type for browser driver operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Navigation error: {message}")]
    Navigation { message: String },

    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Driver error: {message}")]
    Driver { message: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a new navigation error.
    pub fn navigation<S: Into<String>>(message: S) -> Self {
        Self::Navigation {
            message: message.into(),
        }
    }

    /// Create a new driver error.
    pub fn driver<S: Into<String>>(message: S) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }
}

/// Convenience result alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
