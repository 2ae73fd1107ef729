use std::fmt;

use serde::{Deserialize, Serialize};

/// A source line reference. Upstream static analysis merges call sites that
/// resolve to the same chain, so a reference is either one line or a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineRef {
    Single(u32),
    Merged(Vec<u32>),
}

impl LineRef {
    pub fn primary(&self) -> u32 {
        match self {
            LineRef::Single(line) => *line,
            LineRef::Merged(lines) => lines.first().copied().unwrap_or(0),
        }
    }

    pub fn all(&self) -> Vec<u32> {
        match self {
            LineRef::Single(line) => vec![*line],
            LineRef::Merged(lines) => lines.clone(),
        }
    }
}

impl Default for LineRef {
    fn default() -> Self {
        LineRef::Single(0)
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRef::Single(line) => write!(f, "{}", line),
            LineRef::Merged(lines) => {
                let parts: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

/// The dangerous operation terminating a chain (the VD).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkDescriptor {
    pub file: String,
    #[serde(default)]
    pub line: LineRef,
    pub sink: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub param_indices: Vec<usize>,
}

impl SinkDescriptor {
    /// All parameter indices the sink receives tainted data through.
    pub fn tainted_params(&self) -> Vec<usize> {
        if !self.param_indices.is_empty() {
            return self.param_indices.clone();
        }
        self.param_index.map(|i| vec![i]).unwrap_or_default()
    }
}

/// Ordered call path from an entry point to a sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    #[serde(rename = "function_chain")]
    pub functions: Vec<String>,
    #[serde(rename = "function_call_line", default, skip_serializing_if = "Vec::is_empty")]
    pub call_sites: Vec<LineRef>,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Human-readable path, e.g. `main -> parse_input -> copy_buffer`.
    pub fn path(&self) -> String {
        self.functions.join(" -> ")
    }
}

/// One candidate flow: a sink descriptor plus the chain reaching it.
/// Produced by the upstream static-analysis collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    pub vd: SinkDescriptor,
    pub chains: Chain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_ref_accepts_scalar_and_array() {
        let single: LineRef = serde_json::from_str("42").unwrap();
        assert_eq!(single, LineRef::Single(42));

        let merged: LineRef = serde_json::from_str("[42, 47]").unwrap();
        assert_eq!(merged, LineRef::Merged(vec![42, 47]));
        assert_eq!(merged.primary(), 42);
    }

    #[test]
    fn test_flow_record_decodes_upstream_shape() {
        let raw = r#"{
            "vd": {"file": "src/io.c", "line": 42, "sink": "memcpy", "param_index": 2},
            "chains": {"function_chain": ["main", "parse_input", "copy_buffer"],
                       "function_call_line": [10, [22, 31], 42]}
        }"#;
        let flow: FlowRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(flow.vd.sink, "memcpy");
        assert_eq!(flow.vd.tainted_params(), vec![2]);
        assert_eq!(flow.chains.len(), 3);
        assert_eq!(flow.chains.path(), "main -> parse_input -> copy_buffer");
        assert_eq!(flow.chains.call_sites[1], LineRef::Merged(vec![22, 31]));
    }

    #[test]
    fn test_param_indices_take_precedence() {
        let vd = SinkDescriptor {
            file: "a.c".into(),
            line: LineRef::Single(5),
            sink: "sprintf".into(),
            param_index: Some(0),
            param_indices: vec![1, 2],
        };
        assert_eq!(vd.tainted_params(), vec![1, 2]);
    }
}
