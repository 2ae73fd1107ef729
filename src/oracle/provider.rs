use async_trait::async_trait;

use super::types::{Message, OracleResponse};
use crate::errors::ChainscanError;

/// The external reasoning oracle. The engine only sees this contract: a
/// fallible completion over an ordered message history. Transport concerns
/// (timeouts, backoff) live behind it; protocol-level retry sits above it.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete a conversation. Implementations must return transport and
    /// API failures as typed errors; an empty content string is a valid
    /// (degenerate) result the caller handles.
    async fn complete(&self, messages: &[Message]) -> Result<OracleResponse, ChainscanError>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;
}
