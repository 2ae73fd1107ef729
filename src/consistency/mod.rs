//! Verdict/evidence reconciliation: salvage, downgrades, upgrades, and
//! plausibility flags.

mod adjustment;
mod checker;
mod salvage;

pub use adjustment::Adjustment;
pub use checker::{review, ConsistencyReview};
pub use salvage::{reported_empty_evidence, salvage_findings};
