//! Storage error types for the key-value abstraction layer.

use std::fmt;

/// Errors raised by a key-value store backend.
///
/// Business-level absence is never an error at this layer: reads of missing
/// keys return `None` or empty collections.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// A set operation targeted a scalar key or vice versa.
    #[error("Wrong value type at key {key}: expected {expected}")]
    WrongType {
        /// The offending key.
        key: String,
        /// The value kind the operation needed.
        expected: &'static str,
    },

    /// A batch could not be applied.
    #[error("Batch error: {message}")]
    BatchError {
        /// Description of the batch failure.
        message: String,
    },

    /// The backend returned an error for a command.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `WrongType` error.
    #[must_use]
    pub fn wrong_type(key: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            key: key.into(),
            expected,
        }
    }

    /// Creates a new `BatchError` error.
    #[must_use]
    pub fn batch_error(message: impl Into<String>) -> Self {
        Self::BatchError {
            message: message.into(),
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns `true` if the store could not be reached.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionError { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::WrongType { .. } => ErrorCategory::DataShape,
            Self::BatchError { .. } => ErrorCategory::Batch,
            Self::Backend { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Infrastructure/connection error.
    Infrastructure,
    /// Key holds a value of the wrong kind.
    DataShape,
    /// Batch application error.
    Batch,
    /// Internal backend error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::DataShape => write!(f, "data_shape"),
            Self::Batch => write!(f, "batch"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
