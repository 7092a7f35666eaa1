use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;

fn alice() -> Arc<Value> {
    Arc::new(json!({ "name": "Alice" }))
}

#[test]
fn test_item_without_expiry_is_invalid() {
    let item = CacheItem::resolved(alice());
    assert!(!item.is_resolving());
    assert!(item.has_expired());
    assert!(!item.is_valid());
    assert_eq!(item.valid_value(), None);
    assert_eq!(item.value(), Some(&alice()));
}

#[test]
fn test_pending_item_is_invalid() {
    let item = CacheItem::pending().expires_in(Duration::from_secs(60));
    assert!(item.is_resolving());
    assert!(!item.has_expired());
    assert!(!item.is_valid());
    assert_eq!(item.value(), None);
}

#[tokio::test(start_paused = true)]
async fn test_item_expires_after_ttl() {
    let item = CacheItem::resolved(alice()).expires_in(Duration::from_secs(600));
    assert!(item.is_valid());
    assert_eq!(item.valid_value(), Some(&alice()));

    tokio::time::advance(Duration::from_secs(599)).await;
    assert!(item.is_valid());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(item.has_expired());
    assert!(!item.is_valid());
    // the payload itself is still there
    assert_eq!(item.value(), Some(&alice()));
}

#[test]
fn test_huge_ttl_is_capped() {
    let item = CacheItem::resolved(alice()).expires_in(Duration::MAX);
    assert!(item.is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_has_ignores_expiry() {
    let store = MemoryStore::new();
    store.set(
        "/api/player/42/full",
        CacheItem::resolved(alice()).expires_in(Duration::from_secs(1)),
    );

    tokio::time::advance(Duration::from_secs(2)).await;

    assert!(store.has("/api/player/42/full"));
    let item = store.get("/api/player/42/full").unwrap();
    assert!(item.has_expired());
}

fn exercise_store(store: &dyn CacheStore) {
    assert!(store.is_empty());
    assert!(!store.has("/a"));
    assert_eq!(store.get("/a"), None);

    store.set("/a", CacheItem::pending());
    store.set("/b", CacheItem::resolved(alice()));
    assert!(store.has("/a"));
    assert!(store.get("/a").unwrap().is_resolving());

    // entries are overwritten, never merged
    let bob = Arc::new(json!({ "name": "Bob" }));
    store.set("/a", CacheItem::resolved(bob.clone()));
    assert_eq!(store.get("/a").unwrap().value(), Some(&bob));

    store.remove("/a");
    assert!(!store.has("/a"));
    assert!(store.has("/b"));

    store.clear();
    assert!(!store.has("/b"));
}

#[test]
fn test_memory_store() {
    let store = MemoryStore::new();
    exercise_store(&store);
    assert_eq!(store.len(), 0);
}

#[test]
fn test_bounded_store() {
    let store = BoundedStore::new(100);
    exercise_store(&store);
}

#[test]
fn test_bounded_store_capacity() {
    let store = BoundedStore::new(2);
    for i in 0..10 {
        let key = format!("/api/player/{i}/full");
        store.set(&key, CacheItem::resolved(alice()));
        store.run_pending_tasks();
    }
    assert!(store.len() <= 2);
}
