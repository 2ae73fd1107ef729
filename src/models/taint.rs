use serde::{Deserialize, Serialize};

use super::phase::PhaseRecord;

/// Taint facts asserted at one chain position. Snapshots accumulate
/// append-only across a chain: recording a sanitizer never removes prior
/// taint facts, it is stored alongside them for the consistency checker
/// to interpret.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaintSnapshot {
    pub position: usize,
    pub function: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tainted_vars: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub propagation: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sanitizers_applied: Vec<String>,
    #[serde(default)]
    pub sink_reached: bool,
}

impl TaintSnapshot {
    /// Derive the snapshot for a position from its parsed record. `End`
    /// records carry no taint payload and yield `None`.
    pub fn from_record(record: &PhaseRecord, position: usize, function: &str) -> Option<Self> {
        let (tainted_vars, propagation, sanitizers, sink_reached) = match record {
            PhaseRecord::Start(r) => (
                r.tainted_vars.clone().unwrap_or_default(),
                r.propagation.clone().unwrap_or_default(),
                r.sanitizers.clone(),
                false,
            ),
            PhaseRecord::Middle(r) => (
                r.tainted_vars.clone().unwrap_or_default(),
                r.propagation.clone().unwrap_or_default(),
                r.sanitizers.clone(),
                r.sink_reached.unwrap_or(false),
            ),
            PhaseRecord::End(_) => return None,
        };

        Some(TaintSnapshot {
            position,
            function: function.to_string(),
            tainted_vars: dedup_preserving_order(tainted_vars),
            propagation,
            sanitizers_applied: sanitizers,
            sink_reached,
        })
    }

    /// One-line rendering used to condition the next position's prompt.
    pub fn summary(&self) -> String {
        let vars = if self.tainted_vars.is_empty() {
            "none".to_string()
        } else {
            self.tainted_vars.join(", ")
        };
        let mut out = format!("tainted in {}: {}", self.function, vars);
        if !self.propagation.is_empty() {
            out.push_str(&format!("; propagation: {}", self.propagation.join("; ")));
        }
        if !self.sanitizers_applied.is_empty() {
            out.push_str(&format!("; sanitizers seen: {}", self.sanitizers_applied.join(", ")));
        }
        out
    }
}

fn dedup_preserving_order(vars: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    vars.into_iter().filter(|v| seen.insert(v.clone())).collect()
}
