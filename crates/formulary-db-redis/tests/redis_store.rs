//! Integration tests for the Redis backend.
//!
//! These tests use testcontainers to spin up a real Redis instance and are
//! ignored by default. Run them with `--ignored` on a machine with Docker.

use formulary_db_redis::{KvStore, RedisSettings, RedisStore};
use formulary_storage::WriteBatch;
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn connect() -> RedisStore {
    let settings = RedisSettings {
        url: get_redis_url().await,
        pool_size: 4,
        timeout_ms: 5000,
    };
    RedisStore::connect(&settings).await.expect("connect")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_scalar_and_ttl() {
    let store = connect().await;

    store.set("it:scalar", "v", None).await.unwrap();
    assert_eq!(store.get("it:scalar").await.unwrap().as_deref(), Some("v"));

    store
        .set("it:ttl", "v", Some(Duration::from_secs(1)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.get("it:ttl").await.unwrap(), None);

    assert!(store.delete("it:scalar").await.unwrap());
    assert!(!store.delete("it:scalar").await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sets_and_intersection() {
    let store = connect().await;

    for member in ["a", "b", "c"] {
        store.set_add("it:x", member).await.unwrap();
    }
    for member in ["b", "c", "d"] {
        store.set_add("it:y", member).await.unwrap();
    }

    let mut both = store
        .set_intersect(&["it:x".to_string(), "it:y".to_string()])
        .await
        .unwrap();
    both.sort();
    assert_eq!(both, vec!["b", "c"]);
    assert_eq!(store.set_cardinality("it:x").await.unwrap(), 3);
    assert!(store.set_contains("it:y", "d").await.unwrap());

    let err = store.get("it:x").await.unwrap_err();
    assert!(matches!(err, formulary_storage::StorageError::WrongType { .. }));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_batch_and_prefix_scan() {
    let store = connect().await;

    let mut batch = WriteBatch::new();
    batch
        .set("it:batch:drug", "{}")
        .set_add("it:batch:class:statins", "drug")
        .set_add("it:batch:class:ssri", "other");
    store.apply(batch).await.unwrap();

    let mut keys = store.keys_with_prefix("it:batch:class:").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["it:batch:class:ssri", "it:batch:class:statins"]);
    assert!(store.supports_atomic_batches());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_batch_with_wrong_type_writes_nothing() {
    let store = connect().await;
    store.set("it:squat:class", "scalar", None).await.unwrap();

    let mut batch = WriteBatch::new();
    batch
        .set("it:squat:drug", "{}")
        .set_add("it:squat:tier", "drug")
        .set_add("it:squat:class", "drug");
    let err = store.apply(batch).await.unwrap_err();
    assert!(matches!(err, formulary_storage::StorageError::WrongType { .. }));

    assert_eq!(store.get("it:squat:drug").await.unwrap(), None);
    assert_eq!(store.set_cardinality("it:squat:tier").await.unwrap(), 0);
    assert_eq!(
        store.get("it:squat:class").await.unwrap().as_deref(),
        Some("scalar")
    );
}
