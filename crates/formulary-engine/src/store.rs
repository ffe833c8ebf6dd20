use std::sync::Arc;

use formulary_core::DynClock;
use formulary_db_memory::InMemoryStore;
use formulary_db_redis::RedisStore;
use formulary_storage::DynKvStore;

use crate::config::{StoreBackend, StoreSettings};
use crate::error::Result;

/// Builds the configured backend.
///
/// The memory backend measures expiry against `clock`. The Redis backend
/// expires keys server-side and ignores it. A Redis server that cannot be
/// reached is an error.
pub async fn create_store(settings: &StoreSettings, clock: DynClock) -> Result<DynKvStore> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(InMemoryStore::with_clock(clock)))
        }
        StoreBackend::Redis => {
            let store = RedisStore::connect(&settings.redis).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_core::system_clock;
    use formulary_db_redis::RedisSettings;

    #[tokio::test]
    async fn test_memory_backend() {
        let store = create_store(&StoreSettings::default(), system_clock())
            .await
            .unwrap();
        assert_eq!(store.backend_name(), "in-memory-dashmap");
        assert!(store.supports_atomic_batches());
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_an_error() {
        let settings = StoreSettings {
            backend: StoreBackend::Redis,
            redis: RedisSettings {
                url: "redis://127.0.0.1:1".into(),
                pool_size: 1,
                timeout_ms: 200,
            },
        };
        let Err(err) = create_store(&settings, system_clock()).await else {
            panic!("connecting to a closed port should fail");
        };
        assert!(err.is_unavailable());
    }
}
