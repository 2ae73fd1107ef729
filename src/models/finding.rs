use serde::{Deserialize, Serialize};

use super::phase::AnalysisPhase;

/// Severity level for a finding, ordered from most to least severe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3, Info = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    /// Lenient parse from oracle output; unknown strings map to None.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" | "informational" => Some(Severity::Info),
            _ => None,
        }
    }
}

/// One piece of structural or confirmed-vulnerability evidence tied to a
/// file/line/function. Collected while parsing `Middle`/`End` responses,
/// deduplicated by the findings merger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    pub line: u32,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_function: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<AnalysisPhase>,
    /// Identifiers of merged-away duplicates, for traceability.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_excerpt: Option<String>,
    /// Set when the verdict claimed a vulnerability but no evidence survived
    /// salvage; the finding records the claim rather than confirming it.
    #[serde(default)]
    pub suspected: bool,
}

impl Finding {
    /// Exact identity used for cross-references and final-pass dedup.
    pub fn identifier(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.function)
    }

    pub fn sink_or_unknown(&self) -> &str {
        self.sink_function.as_deref().unwrap_or("unknown")
    }

    pub fn sorted_rule_ids(&self) -> Vec<String> {
        let mut rules = self.rule_ids.clone();
        rules.sort();
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_rank_ordering() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::High.rank() < Severity::Info.rank());
    }

    #[test]
    fn test_severity_lenient_parse() {
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse(" moderate "), Some(Severity::Medium));
        assert_eq!(Severity::parse("whatever"), None);
    }

    #[test]
    fn test_identifier_shape() {
        let f = Finding {
            file: "src/io.c".into(),
            line: 42,
            function: "copy_buffer".into(),
            sink_function: None,
            rule_ids: vec![],
            rationale: String::new(),
            phase: None,
            refs: vec![],
            code_excerpt: None,
            suspected: false,
        };
        assert_eq!(f.identifier(), "src/io.c:42:copy_buffer");
        assert_eq!(f.sink_or_unknown(), "unknown");
    }
}
