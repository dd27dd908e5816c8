//! Session-dependent, non-durable caches.
//!
//! Anything derived from the current account or chain (asset lookups,
//! contract handles) registers here and is dropped whenever the session is
//! torn down, re-established, or switches account.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

pub trait SessionCache: Send + Sync {
    fn name(&self) -> &str;

    fn reset(&self);
}

#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<Vec<Arc<dyn SessionCache>>>,
}

impl CacheRegistry {
    pub fn register(&self, cache: Arc<dyn SessionCache>) {
        debug!(cache = cache.name(), "Registered session cache");
        self.caches.write().push(cache);
    }

    pub fn reset_all(&self, reason: &str) {
        // Clone the list so a cache may register others from `reset`.
        let caches: Vec<_> = self.caches.read().iter().cloned().collect();
        for cache in caches {
            debug!(cache = cache.name(), reason, "Resetting session cache");
            cache.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }
}

/// Keyed in-memory cache that empties itself on session reset.
pub struct MemoryCache<V> {
    name: String,
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone + Send + Sync> MemoryCache<V> {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), entries: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: V) {
        self.entries.write().insert(key.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone + Send + Sync> SessionCache for MemoryCache<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        self.entries.write().clear();
    }
}
