pub mod chain;
pub mod finding;
pub mod phase;
pub mod taint;
pub mod verdict;

pub use chain::*;
pub use finding::*;
pub use phase::*;
pub use taint::*;
pub use verdict::*;
