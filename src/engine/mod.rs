pub mod analyzer;
pub mod batch;
pub mod report;
pub mod stats;

pub use analyzer::{ChainAnalyzer, ChainOutcome};
pub use batch::{unique_chain_count, BatchResult, BatchRunner};
pub use report::{FailedChain, FlowResult, Report};
pub use stats::{EngineStats, EngineStatsSnapshot, RunStats};
