use std::fmt;

use serde::{Deserialize, Serialize};

use super::finding::{Finding, Severity};

/// Stage of a chain walk. Drives prompt shape, the expected response
/// payload, and field criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPhase {
    Start,
    Middle,
    End,
}

impl AnalysisPhase {
    /// Phase for a 0-indexed position in a chain of `chain_len` functions.
    /// The last position is always `End` so the verdict invariant holds even
    /// for single-function chains.
    pub fn for_position(position: usize, chain_len: usize) -> Self {
        if position + 1 >= chain_len {
            AnalysisPhase::End
        } else if position == 0 {
            AnalysisPhase::Start
        } else {
            AnalysisPhase::Middle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPhase::Start => "start",
            AnalysisPhase::Middle => "middle",
            AnalysisPhase::End => "end",
        }
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Protocol field names used in criticality checks and correction prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Function,
    TaintedVars,
    Propagation,
    VulnerabilityFound,
    VulnerabilityType,
    VulnerableLines,
    WhyNoVulnerability,
    DecisionRationale,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Function => "function",
            Field::TaintedVars => "tainted_vars",
            Field::Propagation => "propagation",
            Field::VulnerabilityFound => "vulnerability_found",
            Field::VulnerabilityType => "vulnerability_type",
            Field::VulnerableLines => "vulnerable_lines",
            Field::WhyNoVulnerability => "why_no_vulnerability",
            Field::DecisionRationale => "decision_rationale",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed payload of a `Start`-phase response.
///
/// Criticality-relevant list fields are `Option<Vec<_>>` so an explicitly
/// empty list from the oracle still counts as present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tainted_vars: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sanitizers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

/// Parsed payload of a `Middle`-phase response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiddleRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tainted_vars: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sanitizers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sink_reached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

/// Parsed payload of an `End`-phase response: the decision, its details,
/// and the final evidence list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_found: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerable_lines: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why_no_vulnerability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Raw details object as the oracle produced it, for the report record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

/// How far parsing got for one response, after the retry budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    Complete,
    Partial,
    Unparseable,
}

/// The accepted analysis of one chain position: the parsed record plus how
/// it was obtained. Serialized into report records as `chain_analyses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAnalysis {
    pub function: String,
    pub position: usize,
    pub status: ParseStatus,
    pub record: PhaseRecord,
}

/// Typed phase payload. Replaces key-by-key probing of loose maps: each
/// phase's criticality rules live in `validate` and are checked exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum PhaseRecord {
    Start(StartRecord),
    Middle(MiddleRecord),
    End(EndRecord),
}

impl PhaseRecord {
    /// An empty record for the phase, used as the best-effort placeholder
    /// when a response stayed unparseable through the retry budget.
    pub fn empty(phase: AnalysisPhase) -> Self {
        match phase {
            AnalysisPhase::Start => PhaseRecord::Start(StartRecord::default()),
            AnalysisPhase::Middle => PhaseRecord::Middle(MiddleRecord::default()),
            AnalysisPhase::End => PhaseRecord::End(EndRecord::default()),
        }
    }

    pub fn phase(&self) -> AnalysisPhase {
        match self {
            PhaseRecord::Start(_) => AnalysisPhase::Start,
            PhaseRecord::Middle(_) => AnalysisPhase::Middle,
            PhaseRecord::End(_) => AnalysisPhase::End,
        }
    }

    pub fn function(&self) -> Option<&str> {
        match self {
            PhaseRecord::Start(r) => r.function.as_deref(),
            PhaseRecord::Middle(r) => r.function.as_deref(),
            PhaseRecord::End(_) => None,
        }
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            PhaseRecord::Start(r) => &r.findings,
            PhaseRecord::Middle(r) => &r.findings,
            PhaseRecord::End(r) => &r.findings,
        }
    }

    pub fn sink_reached(&self) -> bool {
        match self {
            PhaseRecord::Middle(r) => r.sink_reached.unwrap_or(false),
            PhaseRecord::End(r) => r.vulnerability_found.unwrap_or(false),
            PhaseRecord::Start(_) => false,
        }
    }

    /// Missing critical fields for this record's phase. Empty means the
    /// record is acceptable as `Complete` regardless of non-critical gaps.
    pub fn validate(&self) -> Vec<Field> {
        let mut missing = Vec::new();
        match self {
            PhaseRecord::Start(r) => {
                if r.function.is_none() {
                    missing.push(Field::Function);
                }
                if r.tainted_vars.is_none() {
                    missing.push(Field::TaintedVars);
                }
            }
            PhaseRecord::Middle(r) => {
                if r.function.is_none() {
                    missing.push(Field::Function);
                }
                if r.tainted_vars.is_none() {
                    missing.push(Field::TaintedVars);
                }
                if r.propagation.is_none() {
                    missing.push(Field::Propagation);
                }
            }
            PhaseRecord::End(r) => match r.vulnerability_found {
                None => missing.push(Field::VulnerabilityFound),
                Some(true) => {
                    if r.vulnerability_type.is_none() {
                        missing.push(Field::VulnerabilityType);
                    }
                    if r.vulnerable_lines.is_none() {
                        missing.push(Field::VulnerableLines);
                    }
                }
                Some(false) => {
                    if r.why_no_vulnerability.is_none() {
                        missing.push(Field::WhyNoVulnerability);
                    }
                    if r.decision_rationale.is_none() {
                        missing.push(Field::DecisionRationale);
                    }
                }
            },
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_empty()
    }
}
