use thiserror::Error;

/// Core error types for formulary operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown authorization status: {0}")]
    UnknownStatus(String),
}

impl CoreError {
    /// Create a new UnknownStatus error
    pub fn unknown_status(status: impl Into<String>) -> Self {
        Self::UnknownStatus(status.into())
    }
}
