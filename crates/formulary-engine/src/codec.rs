//! JSON encoding of stored values.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{EngineError, Result};

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| EngineError::decode(key, e))
}
