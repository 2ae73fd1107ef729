use crate::models::{EndRecord, MiddleRecord, PhaseRecord, StartRecord};

/// Merge a retry response into the original answer for the same position.
///
/// A field the retry produced wins, including an explicitly empty list;
/// fields the retry omitted keep the original's values. Findings are
/// replaced only when the retry actually carried some, so a terse
/// correction reply cannot erase evidence from the first attempt. A phase
/// mismatch means the retry answered a different question; the original
/// stands.
pub fn merge_retry(original: PhaseRecord, retry: PhaseRecord) -> PhaseRecord {
    match (original, retry) {
        (PhaseRecord::Start(a), PhaseRecord::Start(b)) => PhaseRecord::Start(merge_start(a, b)),
        (PhaseRecord::Middle(a), PhaseRecord::Middle(b)) => PhaseRecord::Middle(merge_middle(a, b)),
        (PhaseRecord::End(a), PhaseRecord::End(b)) => PhaseRecord::End(merge_end(a, b)),
        (original, _) => original,
    }
}

fn merge_start(original: StartRecord, retry: StartRecord) -> StartRecord {
    StartRecord {
        function: retry.function.or(original.function),
        tainted_vars: retry.tainted_vars.or(original.tainted_vars),
        propagation: retry.propagation.or(original.propagation),
        sanitizers: keep_unless_empty(original.sanitizers, retry.sanitizers),
        rationale: retry.rationale.or(original.rationale),
        findings: keep_unless_empty(original.findings, retry.findings),
    }
}

fn merge_middle(original: MiddleRecord, retry: MiddleRecord) -> MiddleRecord {
    MiddleRecord {
        function: retry.function.or(original.function),
        tainted_vars: retry.tainted_vars.or(original.tainted_vars),
        propagation: retry.propagation.or(original.propagation),
        sanitizers: keep_unless_empty(original.sanitizers, retry.sanitizers),
        sink_reached: retry.sink_reached.or(original.sink_reached),
        rationale: retry.rationale.or(original.rationale),
        findings: keep_unless_empty(original.findings, retry.findings),
    }
}

fn merge_end(original: EndRecord, retry: EndRecord) -> EndRecord {
    EndRecord {
        vulnerability_found: retry.vulnerability_found.or(original.vulnerability_found),
        vulnerability_type: retry.vulnerability_type.or(original.vulnerability_type),
        vulnerable_lines: retry.vulnerable_lines.or(original.vulnerable_lines),
        why_no_vulnerability: retry.why_no_vulnerability.or(original.why_no_vulnerability),
        decision_rationale: retry.decision_rationale.or(original.decision_rationale),
        severity: retry.severity.or(original.severity),
        details: retry.details.or(original.details),
        findings: keep_unless_empty(original.findings, retry.findings),
    }
}

fn keep_unless_empty<T>(original: Vec<T>, retry: Vec<T>) -> Vec<T> {
    if retry.is_empty() {
        original
    } else {
        retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisPhase, Finding};

    fn finding(file: &str) -> Finding {
        Finding {
            file: file.into(),
            line: 1,
            function: "f".into(),
            sink_function: None,
            rule_ids: vec![],
            rationale: String::new(),
            phase: None,
            refs: vec![],
            code_excerpt: None,
            suspected: false,
        }
    }

    #[test]
    fn test_retry_fills_missing_field() {
        let original = PhaseRecord::Middle(MiddleRecord {
            function: Some("helper".into()),
            tainted_vars: Some(vec!["len".into()]),
            ..Default::default()
        });
        let retry = PhaseRecord::Middle(MiddleRecord {
            propagation: Some(vec!["len -> copy".into()]),
            ..Default::default()
        });
        let merged = merge_retry(original, retry);
        assert!(merged.is_complete());
        assert_eq!(merged.function(), Some("helper"));
    }

    #[test]
    fn test_retry_value_overrides_original() {
        let original = PhaseRecord::End(EndRecord {
            vulnerability_found: Some(false),
            ..Default::default()
        });
        let retry = PhaseRecord::End(EndRecord {
            vulnerability_found: Some(true),
            vulnerability_type: Some("overflow".into()),
            ..Default::default()
        });
        let PhaseRecord::End(merged) = merge_retry(original, retry) else {
            panic!("expected end record");
        };
        assert_eq!(merged.vulnerability_found, Some(true));
        assert_eq!(merged.vulnerability_type.as_deref(), Some("overflow"));
    }

    #[test]
    fn test_explicitly_empty_list_replaces() {
        let original = PhaseRecord::Start(StartRecord {
            tainted_vars: Some(vec!["argv".into()]),
            ..Default::default()
        });
        let retry = PhaseRecord::Start(StartRecord {
            tainted_vars: Some(vec![]),
            ..Default::default()
        });
        let PhaseRecord::Start(merged) = merge_retry(original, retry) else {
            panic!("expected start record");
        };
        assert_eq!(merged.tainted_vars, Some(vec![]));
    }

    #[test]
    fn test_empty_retry_findings_keep_original() {
        let original = PhaseRecord::Middle(MiddleRecord {
            findings: vec![finding("a.c")],
            ..Default::default()
        });
        let retry = PhaseRecord::Middle(MiddleRecord::default());
        assert_eq!(merge_retry(original, retry).findings().len(), 1);

        let original = PhaseRecord::Middle(MiddleRecord {
            findings: vec![finding("a.c")],
            ..Default::default()
        });
        let retry = PhaseRecord::Middle(MiddleRecord {
            findings: vec![finding("b.c"), finding("c.c")],
            ..Default::default()
        });
        let merged = merge_retry(original, retry);
        assert_eq!(merged.findings().len(), 2);
        assert_eq!(merged.findings()[0].file, "b.c");
    }

    #[test]
    fn test_phase_mismatch_keeps_original() {
        let original = PhaseRecord::Middle(MiddleRecord {
            function: Some("helper".into()),
            ..Default::default()
        });
        let retry = PhaseRecord::End(EndRecord::default());
        let merged = merge_retry(original, retry);
        assert_eq!(merged.phase(), AnalysisPhase::Middle);
        assert_eq!(merged.function(), Some("helper"));
    }
}
