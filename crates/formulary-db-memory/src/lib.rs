//! In-memory key-value backend for the formulary engine.
//!
//! This crate provides an implementation of the `KvStore` trait from
//! `formulary-storage` on top of a `DashMap`, with expiry measured against
//! an injectable clock.
//!
//! # Example
//!
//! ```ignore
//! use formulary_db_memory::InMemoryStore;
//! use formulary_storage::KvStore;
//!
//! let store = InMemoryStore::new();
//! store.set_add("formulary:tier:1", "0093-7180-56").await?;
//! assert_eq!(store.set_cardinality("formulary:tier:1").await?, 1);
//! ```

pub mod storage;

pub use formulary_storage::{KvStore, StorageError};
pub use storage::InMemoryStore;

/// Creates a new in-memory store behind the shared trait object.
pub fn create_memory_store() -> formulary_storage::DynKvStore {
    std::sync::Arc::new(InMemoryStore::new())
}
