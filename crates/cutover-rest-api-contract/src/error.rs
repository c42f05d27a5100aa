//! Contract-level validation errors.

/// Error produced while validating a request body against the contract.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl ContractError {
    /// Create a new invalid-input error.
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// The short human-readable message for the boundary `message` field.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput { message } => message,
        }
    }
}

impl From<validator::ValidationErrors> for ContractError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::invalid_input(errors.to_string())
    }
}
