pub mod flows;
pub mod parser;
pub mod schema;
pub mod types;

pub use flows::{load_flows, validate_flows};
pub use parser::load_config;
pub use types::{CacheConfig, EngineConfig, OracleConfig, RetrySettings, RunSettings, TransportSettings};
