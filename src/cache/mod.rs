//! Chain-prefix memoization for incremental re-analysis.

mod prefix;

pub use prefix::{CacheEntry, CacheStatsSnapshot, PrefixCache};
