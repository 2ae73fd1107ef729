use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::conversation::Exchange;
use crate::models::{Finding, PositionAnalysis, TaintSnapshot, Verdict};

/// Memoized analysis state for one chain prefix. An entry keyed by a prefix
/// of length k holds everything established by positions 0..k; `verdict` is
/// only set on full-chain entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    pub prefix: Vec<String>,
    pub exchanges: Vec<Exchange>,
    pub taint_states: Vec<TaintSnapshot>,
    pub findings: Vec<Finding>,
    pub analyses: Vec<PositionAnalysis>,
    pub verdict: Option<Verdict>,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub partial_hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheInner {
    entries: HashMap<Vec<String>, (CacheEntry, u64)>,
    /// Recency index: tick -> key. The smallest tick is the LRU entry.
    recency: BTreeMap<u64, Vec<String>>,
    tick: u64,
}

impl CacheInner {
    fn touch_and_clone(&mut self, key: &[String]) -> Option<CacheEntry> {
        let (cloned, old_tick) = {
            let (entry, tick) = self.entries.get(key)?;
            (entry.clone(), *tick)
        };
        self.tick += 1;
        let new_tick = self.tick;
        self.recency.remove(&old_tick);
        self.recency.insert(new_tick, key.to_vec());
        if let Some(slot) = self.entries.get_mut(key) {
            slot.1 = new_tick;
        }
        Some(cloned)
    }

    fn insert(&mut self, key: Vec<String>, entry: CacheEntry) {
        self.tick += 1;
        let new_tick = self.tick;
        if let Some((_, old_tick)) = self.entries.insert(key.clone(), (entry, new_tick)) {
            self.recency.remove(&old_tick);
        }
        self.recency.insert(new_tick, key);
    }

    fn evict_lru(&mut self) -> Option<Vec<String>> {
        let oldest = *self.recency.keys().next()?;
        let key = self.recency.remove(&oldest)?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Chain-prefix memoization with bounded LRU eviction.
///
/// Shared across worker tasks behind an `Arc`; one internal mutex guards
/// the map and the recency index. Reads hand back a clone, so callers can
/// never mutate a stored entry. Misses are never errors.
pub struct PrefixCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    partial_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PrefixCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            partial_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Longest memoized prefix of `chain`, scanning from the full chain
    /// down to a single function. A match shorter than the chain counts as
    /// a partial hit. Returns the matched length and a copy of the entry.
    pub async fn longest_prefix_match(&self, chain: &[String]) -> (usize, Option<CacheEntry>) {
        let mut inner = self.inner.lock().await;
        for len in (1..=chain.len()).rev() {
            if let Some(entry) = inner.touch_and_clone(&chain[..len]) {
                if len == chain.len() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.partial_hits.fetch_add(1, Ordering::Relaxed);
                }
                debug!(matched = len, queried = chain.len(), "prefix cache match");
                return (len, Some(entry));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        (0, None)
    }

    /// Exact-prefix lookup.
    pub async fn get(&self, prefix: &[String]) -> Option<CacheEntry> {
        let mut inner = self.inner.lock().await;
        match inner.touch_and_clone(prefix) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Memoize the state after `position` completed. The key is the prefix
    /// of `chain` through `position`, inclusive. Inserting a new key at
    /// capacity evicts the least-recently-touched entry first.
    pub async fn save_prefix(&self, chain: &[String], position: usize, entry: CacheEntry) {
        if position >= chain.len() {
            return;
        }
        let key = chain[..=position].to_vec();
        let mut inner = self.inner.lock().await;
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            if let Some(evicted) = inner.evict_lru() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(prefix_len = evicted.len(), "evicted LRU cache entry");
            }
        }
        inner.insert(key, entry);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            partial_hits: self.partial_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
