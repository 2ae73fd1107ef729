//! JSON Lines conversation trace for offline debugging of oracle dialogue.

mod logger;

pub use logger::{TraceLogger, TraceRecord};
