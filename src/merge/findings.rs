use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{AnalysisPhase, Finding};

type GroupKey = (String, u32, String, Vec<String>);

/// Merge findings that describe the same defect.
///
/// Findings share a bucket when they agree on file, two-line location
/// window, sink, and rule set. Each bucket keeps its most authoritative
/// member: final-phase evidence outranks earlier phases, which outrank
/// phase-less salvage, and ties keep the earliest-seen finding. The
/// survivors absorb the merged-away identifiers as refs, then one exact
/// identity pass removes stragglers the windowing missed.
pub fn merge_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let before = findings.len();
    let mut buckets: Vec<Vec<Finding>> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for finding in findings {
        let key = group_key(&finding);
        match index.get(&key) {
            Some(&at) => buckets[at].push(finding),
            None => {
                index.insert(key, buckets.len());
                buckets.push(vec![finding]);
            }
        }
    }

    let mut merged: Vec<Finding> = buckets.into_iter().map(collapse_bucket).collect();

    let mut seen = HashSet::new();
    merged.retain(|f| seen.insert(f.identifier()));

    merged.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    if merged.len() < before {
        debug!(before, after = merged.len(), "merged duplicate findings");
    }
    merged
}

fn group_key(finding: &Finding) -> GroupKey {
    (
        finding.file.clone(),
        finding.line / 2,
        finding.sink_or_unknown().to_string(),
        finding.sorted_rule_ids(),
    )
}

fn collapse_bucket(mut bucket: Vec<Finding>) -> Finding {
    let mut rep_at = 0;
    for (i, candidate) in bucket.iter().enumerate() {
        if phase_priority(candidate) < phase_priority(&bucket[rep_at]) {
            rep_at = i;
        }
    }
    let mut rep = bucket.remove(rep_at);
    for member in bucket {
        absorb_ref(&mut rep, member.identifier());
        for r in member.refs {
            absorb_ref(&mut rep, r);
        }
    }
    rep
}

fn absorb_ref(rep: &mut Finding, id: String) {
    if id != rep.identifier() && !rep.refs.contains(&id) {
        rep.refs.push(id);
    }
}

fn phase_priority(finding: &Finding) -> u8 {
    match finding.phase {
        Some(AnalysisPhase::End) => 0,
        Some(_) => 1,
        None => 2,
    }
}
