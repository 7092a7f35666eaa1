use super::{CacheItem, CacheStore};

/// A [`CacheStore`] holding at most a fixed number of items.
///
/// Eviction is purely capacity based: expiry is still decided by [`CacheItem::expires_at`], so
/// expired items stay visible to [`has`](CacheStore::has) until they are pushed out.
pub struct BoundedStore {
    items: moka::sync::Cache<String, CacheItem>,
    capacity: u64,
}

impl BoundedStore {
    pub fn new(capacity: u64) -> Self {
        let items = moka::sync::Cache::builder()
            .name("accio")
            .max_capacity(capacity)
            .build();
        Self { items, capacity }
    }

    /// Applies pending evictions.
    ///
    /// Eviction happens lazily, this makes [`len`](CacheStore::len) exact.
    pub fn run_pending_tasks(&self) {
        self.items.run_pending_tasks();
    }
}

impl std::fmt::Debug for BoundedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedStore")
            .field("items", &self.items.entry_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl CacheStore for BoundedStore {
    fn has(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<CacheItem> {
        self.items.get(key)
    }

    fn set(&self, key: &str, item: CacheItem) {
        self.items.insert(key.to_owned(), item);
    }

    fn remove(&self, key: &str) {
        self.items.invalidate(key);
    }

    fn clear(&self) {
        self.items.invalidate_all();
    }

    fn len(&self) -> usize {
        self.items.entry_count() as usize
    }
}
