use serde::{Deserialize, Serialize};

use super::finding::Severity;
use super::phase::EndRecord;

/// Final classification of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The oracle confirmed a vulnerability and evidence supports it.
    Vulnerable,
    /// The oracle claimed a vulnerability but no evidence survived salvage.
    Suspected,
    /// No vulnerability.
    Clean,
}

impl Decision {
    /// Suspected chains stay reportable; only `Clean` is filtered out of
    /// vulnerability counts.
    pub fn counts_as_vulnerable(&self) -> bool {
        !matches!(self, Decision::Clean)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Vulnerable => "vulnerable",
            Decision::Suspected => "suspected",
            Decision::Clean => "clean",
        }
    }
}

/// Final decision for one chain, produced at the `End` phase and reconciled
/// by the consistency checker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_refs: Vec<String>,
}

impl Verdict {
    /// Build the verdict from a parsed `End` record. A record that never
    /// yielded a decision flag maps to `Clean` with an explanatory
    /// rationale; the consistency checker may still upgrade it when
    /// findings exist.
    pub fn from_end(record: &EndRecord) -> Self {
        match record.vulnerability_found {
            Some(true) => Verdict {
                decision: Decision::Vulnerable,
                vulnerability_type: record.vulnerability_type.clone(),
                severity: record.severity.clone(),
                rationale: record
                    .decision_rationale
                    .clone()
                    .or_else(|| record.vulnerable_lines.clone().map(|l| format!("vulnerable lines: {}", l))),
                evidence_refs: Vec::new(),
            },
            Some(false) => Verdict {
                decision: Decision::Clean,
                vulnerability_type: None,
                severity: None,
                rationale: record
                    .why_no_vulnerability
                    .clone()
                    .or_else(|| record.decision_rationale.clone()),
                evidence_refs: Vec::new(),
            },
            None => Verdict {
                decision: Decision::Clean,
                vulnerability_type: None,
                severity: None,
                rationale: Some("no decision could be extracted from the final response".into()),
                evidence_refs: Vec::new(),
            },
        }
    }
}
