//! Bounded TTL + LRU cache
//!
//! - Entries expire after `ttl` without access
//! - At capacity: purge expired entries first, otherwise evict the single
//!   least-recently-accessed entry
//! - Every removal is one map removal, so an interrupted sweep leaves the
//!   map consistent
//! - `put`, `invalidate` and `clear` advance a write generation; a cold read
//!   fills the cache with `put_if_unchanged` so it never replaces a value
//!   written after the read began

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// A cached payload with its last access time.
#[derive(Debug, Clone)]
pub struct CacheRecord<V> {
    pub payload: V,
    pub last_access: Instant,
}

impl<V> CacheRecord<V> {
    fn new(payload: V, now: Instant) -> Self {
        Self {
            payload,
            last_access: now,
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_access) > ttl
    }
}

/// Cache statistics.
///
/// Passive only: nothing in the cache reads these to make decisions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Entries evicted because the cache was full.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Current number of entries.
    pub entries: usize,
}

/// Concurrent bounded cache with idle-time expiry.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheRecord<V>>>,
    max_entries: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    generation: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `max_entries` (minimum 1).
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Current write generation. Read it before loading a value from disk.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Looks up a value and refreshes its access time.
    ///
    /// An entry whose TTL already elapsed counts as a miss and is dropped.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let Ok(mut entries) = self.entries.write() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let expired = match entries.get_mut(key) {
            Some(record) if !record.is_expired(now, self.ttl) => {
                record.last_access = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(record.payload.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Returns true if a live entry exists, without refreshing it.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(key)
                    .map(|record| !record.is_expired(now, self.ttl))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Inserts or replaces a value, evicting if the cache is full.
    pub fn put(&self, key: K, value: V) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.insert_locked(&mut entries, key, value);
    }

    /// Inserts only if nothing was written since `generation` was taken.
    ///
    /// Returns false when the value was discarded.
    pub fn put_if_unchanged(&self, key: K, value: V, generation: u64) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        self.insert_locked(&mut entries, key, value);
        true
    }

    fn insert_locked(&self, entries: &mut HashMap<K, CacheRecord<V>>, key: K, value: V) {
        let now = Instant::now();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let before = entries.len();
            entries.retain(|_, record| !record.is_expired(now, self.ttl));
            let expired = before - entries.len();

            if expired > 0 {
                self.expirations
                    .fetch_add(expired as u64, Ordering::Relaxed);
            } else {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, record)| record.last_access)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        entries.insert(key, CacheRecord::new(value, now));
    }

    /// Removes one entry
    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Ok(mut entries) = self.entries.write() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            entries.remove(key);
        }
    }

    /// Removes every entry
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            entries.clear();
        }
    }

    /// Removes all entries idle for longer than the TTL.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = match self.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|(_, record)| record.is_expired(now, self.ttl))
                .map(|(k, _)| k.clone())
                .collect(),
            Err(_) => return 0,
        };

        let mut removed = 0;
        for key in expired {
            let Ok(mut entries) = self.entries.write() else {
                break;
            };
            // Re-check: the entry may have been touched since the scan.
            if entries
                .get(&key)
                .map(|record| record.is_expired(now, self.ttl))
                .unwrap_or(false)
            {
                entries.remove(&key);
                removed += 1;
            }
        }

        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of entries, live or not yet swept
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
