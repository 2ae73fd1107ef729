//! Cross-position findings deduplication.

mod findings;

pub use findings::merge_findings;
