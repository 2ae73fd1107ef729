use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::CacheStatsSnapshot;
use crate::retry::RetryStatsSnapshot;

/// Run-wide counters, shared across workers and read live by the progress
/// display.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub chains_analyzed: AtomicU64,
    pub chains_from_cache: AtomicU64,
    pub chains_failed: AtomicU64,
    pub oracle_calls: AtomicU64,
    pub empty_responses: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            chains_analyzed: self.chains_analyzed.load(Ordering::Relaxed),
            chains_from_cache: self.chains_from_cache.load(Ordering::Relaxed),
            chains_failed: self.chains_failed.load(Ordering::Relaxed),
            oracle_calls: self.oracle_calls.load(Ordering::Relaxed),
            empty_responses: self.empty_responses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineStatsSnapshot {
    pub chains_analyzed: u64,
    pub chains_from_cache: u64,
    pub chains_failed: u64,
    pub oracle_calls: u64,
    pub empty_responses: u64,
}

/// The `stats` block of the report envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub engine: EngineStatsSnapshot,
    pub cache: CacheStatsSnapshot,
    pub retry: RetryStatsSnapshot,
    /// Consistency adjustments applied during the run, tallied by kind.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub adjustments: HashMap<String, u64>,
}
