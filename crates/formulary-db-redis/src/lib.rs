//! Redis key-value backend for the formulary engine.
//!
//! Scalars map to Redis strings (`SET`/`SET EX`), index sets to Redis sets
//! (`SADD`/`SREM`/`SINTER`/`SCARD`) and batches to `MULTI`/`EXEC`
//! pipelines. Connections come from a `deadpool-redis` pool.

pub mod storage;

pub use formulary_storage::{KvStore, StorageError};
pub use storage::{RedisSettings, RedisStore};
