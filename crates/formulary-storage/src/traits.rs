//! The key-value store contract consumed by the formulary engine.

use async_trait::async_trait;
use std::time::Duration;

use crate::batch::{WriteBatch, WriteOp};
use crate::error::StorageError;

/// A key-value store with scalar values, string sets and per-key expiry.
///
/// Every individual call is atomic for its key. Implementations must be
/// thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use formulary_storage::{KvStore, StorageError};
///
/// async fn tier_size(store: &dyn KvStore, tier: u8) -> Result<u64, StorageError> {
///     store.set_cardinality(&format!("formulary:tier:{tier}")).await
/// }
/// ```
#[async_trait]
pub trait KvStore: Send + Sync {
    // ==================== Scalars ====================

    /// Reads a scalar value. Missing and expired keys return `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::WrongType` if the key holds a set.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a scalar value, replacing whatever the key held.
    ///
    /// With `ttl` the key disappears once the duration elapses; without it
    /// any previous expiry is cleared.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> Result<(), StorageError>;

    /// Deletes a key of any kind. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    // ==================== Sets ====================

    /// Adds a member to a set, creating it if needed. Returns whether the
    /// member was newly added.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::WrongType` if the key holds a scalar.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StorageError>;

    /// Removes a member. Returns whether it was present. A set left empty
    /// ceases to exist.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StorageError>;

    /// All members of a set, in backend order. Missing keys are empty sets.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StorageError>;

    /// Members present in every listed set. An empty key list yields an
    /// empty result.
    async fn set_intersect(&self, keys: &[String]) -> Result<Vec<String>, StorageError>;

    /// Number of members in a set.
    async fn set_cardinality(&self, key: &str) -> Result<u64, StorageError>;

    /// Returns `true` if `member` belongs to the set.
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StorageError>;

    // ==================== Enumeration ====================

    /// Lists live keys starting with `prefix`. Cost grows with the key space.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    // ==================== Batches ====================

    /// Applies a group of writes.
    ///
    /// The default implementation applies the ops in order and stops at the
    /// first failure without undoing earlier writes.
    async fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        for op in batch.into_ops() {
            apply_op(self, op).await?;
        }
        Ok(())
    }

    // ==================== Metadata ====================

    /// Returns whether [`KvStore::apply`] is all-or-nothing for this backend.
    fn supports_atomic_batches(&self) -> bool {
        false
    }

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Applies one op through the scalar/set primitives of `store`.
pub async fn apply_op<S: KvStore + ?Sized>(store: &S, op: WriteOp) -> Result<(), StorageError> {
    match op {
        WriteOp::Set { key, value, ttl } => store.set(&key, &value, ttl).await,
        WriteOp::Delete { key } => store.delete(&key).await.map(|_| ()),
        WriteOp::SetAdd { key, member } => store.set_add(&key, &member).await.map(|_| ()),
        WriteOp::SetRemove { key, member } => store.set_remove(&key, &member).await.map(|_| ()),
    }
}
