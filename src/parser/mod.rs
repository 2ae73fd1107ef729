//! Phase-aware response parsing: normalization, segmentation, mechanical
//! JSON repair, and loose coercion into typed phase records.

mod decode;
mod findings;
mod normalize;
mod repair;
mod result;
mod retry_merge;
mod segment;

pub use decode::parse_response;
pub use findings::findings_from_items;
pub use normalize::normalize;
pub use repair::{decode_or_repair, repair};
pub use result::ParseResult;
pub use retry_merge::merge_retry;
pub use segment::{labeled_block, segments};
