use std::collections::VecDeque;
use std::sync::Mutex;

use dashmap::DashMap;

/// LRU cache of conversation turn responses keyed by chain-prefix
/// signature, so two candidate flows sharing a common path prefix
/// (common on TAs with one dispatcher function) don't re-ask the model
/// about the same hops twice.
pub struct PrefixCache {
    entries: DashMap<String, String>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

impl PrefixCache {
    /// Builds an empty cache with room for `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity,
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        }
    }

    /// Looks up a cached response for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let result = self.entries.get(key).map(|entry| entry.clone());
        if result.is_some() {
            *self.hits.lock().expect("prefix cache lock poisoned") += 1;
            self.touch(key);
        } else {
            *self.misses.lock().expect("prefix cache lock poisoned") += 1;
        }
        result
    }

    /// Inserts a response for `key`, evicting the least-recently-used
    /// entry if the cache is full.
    pub fn insert(&self, key: String, value: String) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.entries.insert(key.clone(), value);
        self.touch(&key);
    }

    fn touch(&self, key: &str) {
        let mut order = self.order.lock().expect("prefix cache lock poisoned");
        order.retain(|existing| existing != key);
        order.push_back(key.to_owned());
    }

    fn evict_one(&self) {
        let mut order = self.order.lock().expect("prefix cache lock poisoned");
        if let Some(oldest) = order.pop_front() {
            self.entries.remove(&oldest);
        }
    }

    /// Cache hit rate across this cache's lifetime, `0.0` if no lookups
    /// have happened yet.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let hits = *self.hits.lock().expect("prefix cache lock poisoned");
        let misses = *self.misses.lock().expect("prefix cache lock poisoned");
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
