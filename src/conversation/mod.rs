//! Per-chain conversation state.

mod context;

pub use context::{ConversationContext, Exchange, PromptType};
