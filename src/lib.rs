pub mod cache;
pub mod cli;
pub mod config;
pub mod consistency;
pub mod conversation;
pub mod engine;
pub mod errors;
pub mod merge;
pub mod models;
pub mod oracle;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod trace;
pub mod utils;

pub use errors::ChainscanError;
