//! REST client error types.

/// Error type for REST client operations.
#[derive(Debug, thiserror::Error)]
pub enum RestClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl RestClientError {
    /// Create an API error from a status and a message body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

/// Convenience result alias for client operations.
pub type RestClientResult<T> = std::result::Result<T, RestClientError>;
