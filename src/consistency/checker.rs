use tracing::debug;

use crate::models::{AnalysisPhase, Decision, Finding, SinkDescriptor, TaintSnapshot, Verdict};

use super::adjustment::Adjustment;
use super::salvage::{reported_empty_evidence, salvage_findings};

/// Substrings whose presence in tracked taint facts marks data of untrusted
/// origin. A vulnerability claim unsupported by any of these is flagged.
const UNTRUSTED_ORIGIN_MARKERS: [&str; 20] = [
    "param",
    "argv",
    "arg",
    "input",
    "buffer",
    "buf",
    "size",
    "len",
    "length",
    "user",
    "request",
    "network",
    "socket",
    "recv",
    "stdin",
    "env",
    "external",
    "untrusted",
    "client",
    "remote",
];

/// Rationale vocabulary of a purely structural match: the pattern looks
/// dangerous, but nothing asserts that tainted data actually arrives.
const STRUCTURAL_MARKERS: [&str; 12] = [
    "structural",
    "pattern",
    "heuristic",
    "potential",
    "possible",
    "may",
    "might",
    "could",
    "unvalidated",
    "unchecked",
    "missing check",
    "no bounds",
];

const CONFIRMED_PHRASES: [&str; 3] = ["confirmed", "sink reached", "reaches the sink"];

/// Outcome of reconciling a chain's verdict with its evidence.
#[derive(Debug, Clone)]
pub struct ConsistencyReview {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub adjustments: Vec<Adjustment>,
}

/// Reconcile the final verdict with the merged findings and the taint facts
/// tracked across the chain. The oracle's claims are never trusted blindly:
/// a positive verdict needs evidence, a clean one must not be contradicted
/// by confirmed findings, and a sink-reached claim must trace back to an
/// untrusted origin.
pub fn review(
    verdict: Verdict,
    findings: Vec<Finding>,
    taint_states: &[TaintSnapshot],
    raw_end_text: &str,
    vd: &SinkDescriptor,
) -> ConsistencyReview {
    let mut verdict = verdict;
    let mut findings = findings;
    let mut adjustments = Vec::new();

    if verdict.decision == Decision::Vulnerable
        && !taint_states.is_empty()
        && !has_untrusted_origin(taint_states)
    {
        let detail = format!(
            "verdict claims {} is reached but no tracked taint fact names an untrusted origin",
            vd.sink
        );
        debug!(sink = %vd.sink, "unsupported sink claim");
        adjustments.push(Adjustment::UnsupportedSinkClaim { detail });
    }

    match verdict.decision {
        Decision::Vulnerable if findings.is_empty() => {
            let salvaged = salvage_findings(raw_end_text);
            if !salvaged.is_empty() {
                debug!(count = salvaged.len(), "salvaged evidence from raw text");
                adjustments.push(Adjustment::SalvagedEvidence {
                    count: salvaged.len(),
                });
                findings = salvaged;
            } else if reported_empty_evidence(raw_end_text) {
                adjustments.push(Adjustment::DowngradedToClean {
                    reason: "vulnerability claimed alongside an explicitly empty evidence list"
                        .to_string(),
                });
                verdict.decision = Decision::Clean;
            } else {
                adjustments.push(Adjustment::DowngradedToSuspected {
                    reason: "vulnerability claimed but no evidence could be recovered".to_string(),
                });
                verdict.decision = Decision::Suspected;
                findings.push(suspected_finding(vd));
            }
        }
        Decision::Clean if !findings.is_empty() => {
            let (structural, supporting): (Vec<_>, Vec<_>) =
                findings.into_iter().partition(is_structural_only);
            if !structural.is_empty() {
                adjustments.push(Adjustment::FilteredStructuralFindings {
                    removed: structural.len(),
                });
            }
            if !supporting.is_empty() {
                debug!(supporting = supporting.len(), "clean verdict contradicted by findings");
                adjustments.push(Adjustment::UpgradedToVulnerable {
                    supporting: supporting.len(),
                });
                verdict.decision = Decision::Vulnerable;
            }
            findings = supporting;
        }
        _ => {}
    }

    ConsistencyReview {
        verdict,
        findings,
        adjustments,
    }
}

fn has_untrusted_origin(taint_states: &[TaintSnapshot]) -> bool {
    taint_states.iter().any(|snap| {
        snap.tainted_vars
            .iter()
            .chain(snap.propagation.iter())
            .any(|fact| {
                let lowered = fact.to_lowercase();
                UNTRUSTED_ORIGIN_MARKERS
                    .iter()
                    .any(|marker| lowered.contains(marker))
            })
    })
}

/// A finding is structural-only when its rationale leans on hedging or
/// pattern vocabulary at least twice and never asserts a confirmed path to
/// the sink.
fn is_structural_only(finding: &Finding) -> bool {
    let lowered = finding.rationale.to_lowercase();
    if CONFIRMED_PHRASES.iter().any(|p| lowered.contains(p)) {
        return false;
    }
    let hits = STRUCTURAL_MARKERS
        .iter()
        .filter(|marker| lowered.contains(*marker))
        .count();
    hits >= 2
}

fn suspected_finding(vd: &SinkDescriptor) -> Finding {
    Finding {
        file: vd.file.clone(),
        line: vd.line.primary(),
        function: vd.sink.clone(),
        sink_function: Some(vd.sink.clone()),
        rule_ids: Vec::new(),
        rationale: "verdict claimed a vulnerability but no structured evidence survived"
            .to_string(),
        phase: Some(AnalysisPhase::End),
        refs: Vec::new(),
        code_excerpt: None,
        suspected: true,
    }
}
