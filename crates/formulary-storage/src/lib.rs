//! # formulary-storage
//!
//! Key-value store abstraction for the formulary engine.
//!
//! This crate defines the contract every store backend must implement. It
//! does not contain any implementations - those are provided by separate
//! crates (`formulary-db-memory`, `formulary-db-redis`).
//!
//! ## Overview
//!
//! The main trait is [`KvStore`], which covers:
//! - scalar get/set/delete with optional expiry
//! - string sets: add, remove, members, intersection, cardinality
//! - key enumeration by prefix
//! - grouped writes via [`WriteBatch`]

mod batch;
mod error;
mod traits;

pub use batch::{WriteBatch, WriteOp};
pub use error::{ErrorCategory, StorageError};
pub use traits::{KvStore, apply_op};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable store trait object.
pub type DynKvStore = std::sync::Arc<dyn KvStore>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::batch::{WriteBatch, WriteOp};
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::KvStore;
    pub use crate::{DynKvStore, StorageResult};
}
