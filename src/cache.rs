//! Bounded in-memory LRU cache shared across concurrent requests.
//!
//! DESIGN
//! ======
//! Entries live in a `HashMap` and recency in a `VecDeque` of keys, both
//! behind one `Mutex` so eviction is serialized against inserts. Counters are
//! atomics so `stats()` never contends with lookups. Capacities here are small
//! (tens of entries), so the linear recency update is fine.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

pub struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

struct LruInner<K, V> {
    entries: HashMap<K, V>,
    /// Least recently used at the front.
    order: VecDeque<K>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A cache holding at most `capacity` entries. Zero disables storage.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner { entries: HashMap::new(), order: VecDeque::new() }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let Some(value) = inner.entries.get(key).cloned() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        touch(&mut inner.order, key);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Insert or replace `key`, evicting least recently used entries at capacity.
    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.lock();
        if inner.entries.insert(key.clone(), value).is_some() {
            touch(&mut inner.order, &key);
            return;
        }
        inner.order.push_back(key);
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop every entry. Counters are left alone.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fold over the stored values without cloning them.
    pub fn fold_values<A>(&self, init: A, f: impl FnMut(A, &V) -> A) -> A {
        self.lock().entries.values().fold(init, f)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.capacity,
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruInner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn touch<K: Eq>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
