use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime};
use formulary_storage::{KvStore, StorageError, WriteBatch, WriteOp};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Redis-backed key-value store.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("pool_status", &self.pool.status())
            .finish()
    }
}

impl RedisStore {
    /// Wraps an existing pool without checking connectivity.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Creates a pool from `settings` and verifies it with a `PING`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConnectionError` if the pool cannot be built
    /// or the server does not answer.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, StorageError> {
        tracing::info!(url = %settings.url, pool_size = settings.pool_size, "connecting to Redis");

        let timeout = Duration::from_millis(settings.timeout_ms);
        let mut pool_config = PoolConfig::new(settings.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = deadpool_redis::Config::from_url(&settings.url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::connection_error(format!("create Redis pool: {e}")))?;

        let store = Self::from_pool(pool);
        store.ping().await?;
        tracing::info!("connected to Redis");
        Ok(store)
    }

    /// Round-trips a `PING` (for health checks).
    pub async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("PING", "", e))?;
        Ok(())
    }

    async fn conn(&self) -> Result<Connection, StorageError> {
        self.pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to get Redis connection");
            StorageError::connection_error(e.to_string())
        })
    }
}

fn command_error(key: &str, expected: &'static str, e: redis::RedisError) -> StorageError {
    if e.code() == Some("WRONGTYPE") {
        StorageError::wrong_type(key, expected)
    } else if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        StorageError::connection_error(e.to_string())
    } else {
        StorageError::backend(e.to_string())
    }
}

/// Escapes glob metacharacters so a prefix matches literally in `KEYS`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Value kind of a key as reported by `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Scalar,
    Set,
    Absent,
    Other,
}

impl KeyKind {
    fn from_type_reply(reply: &str) -> Self {
        match reply {
            "string" => Self::Scalar,
            "set" => Self::Set,
            "none" => Self::Absent,
            _ => Self::Other,
        }
    }
}

/// Replays the kinds each op leaves behind and rejects the first op Redis
/// would answer with `WRONGTYPE` inside `EXEC`.
fn check_batch_kinds(
    ops: &[WriteOp],
    current: &HashMap<String, KeyKind>,
) -> Result<(), StorageError> {
    let mut planned: HashMap<&str, KeyKind> = HashMap::new();
    for op in ops {
        let key = op.key();
        let kind = planned
            .get(key)
            .or_else(|| current.get(key))
            .copied()
            .unwrap_or(KeyKind::Absent);
        let next = match op {
            WriteOp::Set { .. } => KeyKind::Scalar,
            WriteOp::Delete { .. } => KeyKind::Absent,
            WriteOp::SetAdd { .. } | WriteOp::SetRemove { .. } => {
                if matches!(kind, KeyKind::Scalar | KeyKind::Other) {
                    return Err(StorageError::wrong_type(key, "set"));
                }
                KeyKind::Set
            }
        };
        planned.insert(key, next);
    }
    Ok(())
}

/// `SET EX` rejects zero, and sub-second TTLs would otherwise truncate to it.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| command_error(key, "scalar", e))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn().await?;
        let result = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        result.map_err(|e| command_error(key, "scalar", e))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn().await?;
        conn.del::<_, u64>(key)
            .await
            .map(|n| n > 0)
            .map_err(|e| command_error(key, "any", e))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn().await?;
        conn.sadd::<_, _, u64>(key, member)
            .await
            .map(|n| n > 0)
            .map_err(|e| command_error(key, "set", e))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn().await?;
        conn.srem::<_, _, u64>(key, member)
            .await
            .map(|n| n > 0)
            .map_err(|e| command_error(key, "set", e))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.conn().await?;
        conn.smembers::<_, Vec<String>>(key)
            .await
            .map_err(|e| command_error(key, "set", e))
    }

    async fn set_intersect(&self, keys: &[String]) -> Result<Vec<String>, StorageError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        conn.sinter::<_, Vec<String>>(keys)
            .await
            .map_err(|e| command_error(&keys.join(","), "set", e))
    }

    async fn set_cardinality(&self, key: &str) -> Result<u64, StorageError> {
        let mut conn = self.conn().await?;
        conn.scard::<_, u64>(key)
            .await
            .map_err(|e| command_error(key, "set", e))
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn().await?;
        conn.sismember::<_, _, bool>(key, member)
            .await
            .map_err(|e| command_error(key, "set", e))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.conn().await?;
        let pattern = format!("{}*", escape_glob(prefix));
        conn.keys::<_, Vec<String>>(&pattern)
            .await
            .map_err(|e| command_error(prefix, "any", e))
    }

    /// Sends the batch as one `MULTI`/`EXEC` transaction.
    ///
    /// `EXEC` does not roll back a command that fails, so key types are
    /// checked with `TYPE` first and a batch that would hit `WRONGTYPE` is
    /// rejected before anything is written. A type change by another client
    /// between the check and `EXEC` is not detected.
    async fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let size = batch.len();
        let mut conn = self.conn().await?;

        let mut keys: Vec<&str> = batch.ops().iter().map(WriteOp::key).collect();
        keys.sort_unstable();
        keys.dedup();
        let mut types = redis::pipe();
        for key in &keys {
            types.cmd("TYPE").arg(*key);
        }
        let replies: Vec<String> = types
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::batch_error(e.to_string()))?;
        let current: HashMap<String, KeyKind> = keys
            .iter()
            .zip(&replies)
            .map(|(key, reply)| (key.to_string(), KeyKind::from_type_reply(reply)))
            .collect();
        check_batch_kinds(batch.ops(), &current)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.into_ops() {
            match op {
                WriteOp::Set {
                    key,
                    value,
                    ttl: Some(ttl),
                } => {
                    pipe.set_ex(key, value, ttl_secs(ttl)).ignore();
                }
                WriteOp::Set {
                    key,
                    value,
                    ttl: None,
                } => {
                    pipe.set(key, value).ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
                WriteOp::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                WriteOp::SetRemove { key, member } => {
                    pipe.srem(key, member).ignore();
                }
            }
        }

        let _: () = pipe.query_async(&mut conn).await.map_err(|e| {
            tracing::warn!(ops = size, error = %e, "Redis MULTI/EXEC failed");
            StorageError::batch_error(e.to_string())
        })?;
        tracing::debug!(ops = size, "applied batch (MULTI/EXEC)");
        Ok(())
    }

    fn supports_atomic_batches(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
