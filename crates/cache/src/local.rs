//! In-process bounded cache with TTL expiry and oldest-insert eviction.
//! One mutex guards both the map and the insertion order, so expiry checks,
//! eviction and insert are atomic per instance and the size never exceeds
//! `max_entries`.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    /// Insertion sequence; stale order-queue slots carry an older one.
    seq: u64,
}

struct Inner<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    order: VecDeque<(K, u64)>,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct LocalCache<K, V> {
    name: &'static str,
    inner: Mutex<Inner<K, V>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> LocalCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity(max_entries.min(4096)),
                order: VecDeque::new(),
                next_seq: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            ttl,
            max_entries,
        }
    }

    pub fn with_ttl_secs(name: &'static str, ttl_secs: u64, max_entries: usize) -> Self {
        Self::new(name, Duration::from_secs(ttl_secs), max_entries)
    }

    /// Returns a clone of the cached value, or None if missing or expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let lookup = inner
            .map
            .get(key)
            .map(|entry| (entry.inserted_at.elapsed() <= self.ttl).then(|| entry.value.clone()));
        match lookup {
            Some(Some(value)) => {
                inner.hits += 1;
                metrics::counter!("recsys.cache.hit", "cache" => self.name).increment(1);
                return Some(value);
            }
            Some(None) => {
                inner.map.remove(key);
            }
            None => {}
        }
        inner.misses += 1;
        metrics::counter!("recsys.cache.miss", "cache" => self.name).increment(1);
        None
    }

    /// Insert or replace a value. When full, the oldest-inserted entries are
    /// evicted first.
    pub fn put(&self, key: K, value: V) {
        if self.max_entries == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        if inner.map.contains_key(&key) {
            inner.map.remove(&key);
        } else {
            while inner.map.len() >= self.max_entries {
                if !Self::evict_oldest(&mut inner) {
                    break;
                }
            }
        }

        inner.order.push_back((key.clone(), seq));
        inner.map.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                seq,
            },
        );
        Self::compact_order(&mut inner);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().map.remove(key).map(|e| e.value)
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.map.len();
        let ttl = self.ttl;
        inner.map.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        let evicted = before - inner.map.len();
        Self::compact_order(&mut inner);
        if evicted > 0 {
            debug!(cache = self.name, evicted = evicted, "Expired entries purged");
        }
        evicted
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    fn evict_oldest(inner: &mut Inner<K, V>) -> bool {
        while let Some((key, seq)) = inner.order.pop_front() {
            let live = inner.map.get(&key).is_some_and(|e| e.seq == seq);
            if live {
                inner.map.remove(&key);
                inner.evictions += 1;
                metrics::counter!("recsys.cache.evicted").increment(1);
                return true;
            }
        }
        false
    }

    /// Drop order slots that no longer point at a live entry once they
    /// outnumber the live entries by a wide margin.
    fn compact_order(inner: &mut Inner<K, V>) {
        if inner.order.len() <= inner.map.len() * 2 + 16 {
            return;
        }
        let Inner { map, order, .. } = inner;
        order.retain(|(key, seq)| map.get(key).is_some_and(|e| e.seq == *seq));
    }
}
