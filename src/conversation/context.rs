use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AnalysisPhase, TaintSnapshot};
use crate::oracle::Message;

/// Why a prompt was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Initial,
    Retry,
}

/// One query/response pair. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub function: String,
    pub position: usize,
    pub phase: AnalysisPhase,
    pub prompt_type: PromptType,
    pub prompt: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn new(
        function: &str,
        position: usize,
        phase: AnalysisPhase,
        prompt_type: PromptType,
        prompt: String,
        response: String,
    ) -> Self {
        Self {
            function: function.to_string(),
            position,
            phase,
            prompt_type,
            prompt,
            response,
            timestamp: Utc::now(),
        }
    }
}

/// Accumulated dialogue state for one chain analysis. Created fresh per
/// chain or restored wholesale from a cache hit; appended to as positions
/// resolve; discarded once the verdict is committed (the cache keeps its
/// own copy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    system_prompt: String,
    exchanges: Vec<Exchange>,
    taint_states: Vec<TaintSnapshot>,
}

impl ConversationContext {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            exchanges: Vec::new(),
            taint_states: Vec::new(),
        }
    }

    pub fn append(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }

    pub fn record_taint(&mut self, snapshot: TaintSnapshot) {
        self.taint_states.push(snapshot);
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn taint_states(&self) -> &[TaintSnapshot] {
        &self.taint_states
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Fast-forward to cached state: both histories are replaced wholesale,
    /// as if the cached exchanges had just happened.
    pub fn restore(&mut self, exchanges: Vec<Exchange>, taint_states: Vec<TaintSnapshot>) {
        self.exchanges = exchanges;
        self.taint_states = taint_states;
    }

    /// Assemble the message list for a new position query.
    ///
    /// Fresh mode (`include_history = false`, position 0 only) sends the
    /// system prompt and the new query. Cumulative mode replays every prior
    /// exchange first, because the oracle's judgment at position k must be
    /// conditioned on everything established at positions 0..k-1.
    pub fn messages_for_new_prompt(&self, prompt: &str, include_history: bool) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        if include_history {
            for exchange in &self.exchanges {
                messages.push(Message::user(&exchange.prompt));
                messages.push(Message::assistant(&exchange.response));
            }
        }
        messages.push(Message::user(prompt));
        messages
    }

    /// Retries are always cumulative: the correction must see the response
    /// it corrects.
    pub fn messages_for_retry(&self, correction: &str) -> Vec<Message> {
        self.messages_for_new_prompt(correction, true)
    }

    /// Taint summary of the most recent position, used to condition the
    /// next prompt. None when nothing has been established yet.
    pub fn previous_taint_summary(&self) -> Option<String> {
        self.taint_states.last().map(|snapshot| snapshot.summary())
    }
}
