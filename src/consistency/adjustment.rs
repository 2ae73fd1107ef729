use serde::Serialize;

/// One consistency-layer intervention, recorded in the report next to the
/// verdict it touched so reviewers can see what was changed and why.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    /// The verdict claims the sink is reached, but no tracked taint fact
    /// mentions an untrusted origin. Advisory; the verdict stands.
    UnsupportedSinkClaim { detail: String },
    /// Structured evidence failed to parse but was recovered from the raw
    /// final-response text.
    SalvagedEvidence { count: usize },
    /// A vulnerability claim with no recoverable evidence.
    DowngradedToSuspected { reason: String },
    /// The oracle claimed a vulnerability while explicitly reporting an
    /// empty evidence list.
    DowngradedToClean { reason: String },
    /// A clean verdict contradicted by findings that assert a reached sink.
    UpgradedToVulnerable { supporting: usize },
    /// Findings whose rationale is purely structural were dropped from a
    /// clean chain.
    FilteredStructuralFindings { removed: usize },
}

impl Adjustment {
    pub fn kind(&self) -> &'static str {
        match self {
            Adjustment::UnsupportedSinkClaim { .. } => "unsupported_sink_claim",
            Adjustment::SalvagedEvidence { .. } => "salvaged_evidence",
            Adjustment::DowngradedToSuspected { .. } => "downgraded_to_suspected",
            Adjustment::DowngradedToClean { .. } => "downgraded_to_clean",
            Adjustment::UpgradedToVulnerable { .. } => "upgraded_to_vulnerable",
            Adjustment::FilteredStructuralFindings { .. } => "filtered_structural_findings",
        }
    }
}
