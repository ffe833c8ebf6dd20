use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use formulary_core::{DynClock, system_clock};
use formulary_storage::{KvStore, StorageError, WriteBatch, WriteOp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum StoredValue {
    Scalar(String),
    Set(HashSet<String>),
}

/// A value with optional expiry.
#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory key-value store using `DashMap`.
///
/// This store provides:
/// - Per-key atomic scalar and set operations
/// - Lazy expiry: expired keys read as absent and are dropped on access
/// - All-or-nothing batches, isolated from concurrent single-key calls
#[derive(Debug)]
pub struct InMemoryStore {
    data: Arc<DashMap<String, Entry>>,
    clock: DynClock,
    /// Single-key calls hold it shared, batches hold it exclusively.
    batch_gate: RwLock<()>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Creates a new store measuring expiry against `clock`.
    pub fn with_clock(clock: DynClock) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            clock,
            batch_gate: RwLock::new(()),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.data.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired key and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.data.len());
        if purged > 0 {
            tracing::debug!(purged, "purged expired keys");
        }
        purged
    }

    fn drop_if_expired(&self, key: &str, now: OffsetDateTime) {
        self.data.remove_if(key, |_, entry| entry.is_expired(now));
    }

    /// Runs `f` against the live entry at `key`, if any.
    fn with_live<R>(&self, key: &str, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let now = self.clock.now();
        let (result, expired) = match self.data.get(key) {
            Some(entry) if entry.is_expired(now) => (None, true),
            Some(entry) => (Some(f(&entry)), false),
            None => (None, false),
        };
        if expired {
            self.drop_if_expired(key, now);
        }
        result
    }

    fn live_set(&self, key: &str) -> Result<Option<HashSet<String>>, StorageError> {
        self.with_live(key, |entry| match &entry.value {
            StoredValue::Set(members) => Ok(members.clone()),
            StoredValue::Scalar(_) => Err(StorageError::wrong_type(key, "set")),
        })
        .transpose()
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_live(key, |entry| match &entry.value {
            StoredValue::Scalar(value) => Ok(value.clone()),
            StoredValue::Set(_) => Err(StorageError::wrong_type(key, "scalar")),
        })
        .transpose()
    }

    fn set_sync(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| self.clock.now() + ttl);
        self.data.insert(
            key.to_string(),
            Entry {
                value: StoredValue::Scalar(value.to_string()),
                expires_at,
            },
        );
    }

    fn delete_sync(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.data
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now))
    }

    fn set_add_sync(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let now = self.clock.now();
        let fresh = || Entry {
            value: StoredValue::Set(HashSet::from([member.to_string()])),
            expires_at: None,
        };
        match self.data.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(fresh());
                    return Ok(true);
                }
                match &mut occupied.get_mut().value {
                    StoredValue::Set(members) => Ok(members.insert(member.to_string())),
                    StoredValue::Scalar(_) => Err(StorageError::wrong_type(key, "set")),
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(fresh());
                Ok(true)
            }
        }
    }

    fn set_remove_sync(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let now = self.clock.now();
        let removed = match self.data.get_mut(key) {
            Some(entry) if entry.is_expired(now) => None,
            Some(mut entry) => match &mut entry.value {
                StoredValue::Set(members) => Some(members.remove(member)),
                StoredValue::Scalar(_) => return Err(StorageError::wrong_type(key, "set")),
            },
            None => return Ok(false),
        };
        match removed {
            Some(removed) => {
                self.data.remove_if(key, |_, entry| {
                    matches!(&entry.value, StoredValue::Set(members) if members.is_empty())
                });
                Ok(removed)
            }
            None => {
                self.drop_if_expired(key, now);
                Ok(false)
            }
        }
    }

    fn set_intersect_sync(&self, keys: &[String]) -> Result<Vec<String>, StorageError> {
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match self.live_set(key)? {
                Some(members) => sets.push(members),
                None => return Ok(Vec::new()),
            }
        }
        sets.sort_by_key(HashSet::len);
        let Some((smallest, rest)) = sets.split_first() else {
            return Ok(Vec::new());
        };
        Ok(smallest
            .iter()
            .filter(|member| rest.iter().all(|set| set.contains(*member)))
            .cloned()
            .collect())
    }

    /// Rejects batches that would hit a type error part way through, so
    /// that applying the batch afterwards cannot fail.
    fn validate_batch(&self, ops: &[WriteOp]) -> Result<(), StorageError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Kind {
            Scalar,
            Set,
            Absent,
        }

        let mut planned: HashMap<&str, Kind> = HashMap::new();
        for op in ops {
            let key = op.key();
            let current = match planned.get(key) {
                Some(kind) => *kind,
                None => self
                    .with_live(key, |entry| match entry.value {
                        StoredValue::Scalar(_) => Kind::Scalar,
                        StoredValue::Set(_) => Kind::Set,
                    })
                    .unwrap_or(Kind::Absent),
            };
            let next = match op {
                WriteOp::Set { .. } => Kind::Scalar,
                WriteOp::Delete { .. } => Kind::Absent,
                WriteOp::SetAdd { .. } | WriteOp::SetRemove { .. } => {
                    if current == Kind::Scalar {
                        return Err(StorageError::wrong_type(key, "set"));
                    }
                    Kind::Set
                }
            };
            planned.insert(key, next);
        }
        Ok(())
    }

    fn apply_sync(&self, op: WriteOp) -> Result<(), StorageError> {
        match op {
            WriteOp::Set { key, value, ttl } => self.set_sync(&key, &value, ttl),
            WriteOp::Delete { key } => {
                self.delete_sync(&key);
            }
            WriteOp::SetAdd { key, member } => {
                self.set_add_sync(&key, &member)?;
            }
            WriteOp::SetRemove { key, member } => {
                self.set_remove_sync(&key, &member)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _gate = self.batch_gate.read().await;
        self.get_sync(key)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let _gate = self.batch_gate.read().await;
        self.set_sync(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let _gate = self.batch_gate.read().await;
        Ok(self.delete_sync(key))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let _gate = self.batch_gate.read().await;
        self.set_add_sync(key, member)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let _gate = self.batch_gate.read().await;
        self.set_remove_sync(key, member)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let _gate = self.batch_gate.read().await;
        Ok(self
            .live_set(key)?
            .map(|members| members.into_iter().collect())
            .unwrap_or_default())
    }

    async fn set_intersect(&self, keys: &[String]) -> Result<Vec<String>, StorageError> {
        let _gate = self.batch_gate.read().await;
        self.set_intersect_sync(keys)
    }

    async fn set_cardinality(&self, key: &str) -> Result<u64, StorageError> {
        let _gate = self.batch_gate.read().await;
        Ok(self.live_set(key)?.map_or(0, |members| members.len() as u64))
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let _gate = self.batch_gate.read().await;
        Ok(self
            .live_set(key)?
            .is_some_and(|members| members.contains(member)))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let _gate = self.batch_gate.read().await;
        let now = self.clock.now();
        Ok(self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let _gate = self.batch_gate.write().await;
        self.validate_batch(batch.ops())?;
        for op in batch.into_ops() {
            self.apply_sync(op)?;
        }
        Ok(())
    }

    fn supports_atomic_batches(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "in-memory-dashmap"
    }
}
