use std::collections::HashMap;
use std::sync::Mutex;

use super::{CacheItem, CacheStore};

/// The default, unbounded [`CacheStore`].
///
/// Items live until they are removed or the store is cleared.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, CacheItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheItem>> {
        // A panic while holding the lock cannot leave a `HashMap` half-updated.
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let items = self.items.try_lock().map(|i| i.len()).unwrap_or_default();
        f.debug_struct("MemoryStore")
            .field("items", &items)
            .finish()
    }
}

impl CacheStore for MemoryStore {
    fn has(&self, key: &str) -> bool {
        self.items().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<CacheItem> {
        self.items().get(key).cloned()
    }

    fn set(&self, key: &str, item: CacheItem) {
        self.items().insert(key.to_owned(), item);
    }

    fn remove(&self, key: &str) {
        self.items().remove(key);
    }

    fn clear(&self) {
        self.items().clear();
    }

    fn len(&self) -> usize {
        self.items().len()
    }
}
