//! Protocol-level retry: quality scoring, policy decisions, corrections.

mod controller;
mod policy;
mod quality;

pub use controller::{RetryController, RetryDecision, RetryStatsSnapshot};
pub use policy::RetryPolicy;
pub use quality::quality_score;
