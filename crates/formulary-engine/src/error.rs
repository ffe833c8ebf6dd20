use formulary_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Absence is never an error: unknown ids come back as `None`, `false` or
/// empty results. What remains are store failures and undecodable values.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Corrupt value at {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn decode(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            key: key.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` when the underlying store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_connection_error())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
