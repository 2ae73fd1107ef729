use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::debug;

use crate::config::RetrySettings;
use crate::models::{AnalysisPhase, Field};
use crate::parser::ParseResult;
use crate::prompts;

use super::quality::quality_score;

/// What to do with one parsed response.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    /// Keep the parse as-is: complete, or best-effort once the budget or
    /// the policy says stop.
    Accept,
    /// Send this correction and parse again.
    Retry { correction: String },
}

/// Point-in-time copy of the retry counters for the report envelope.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RetryStatsSnapshot {
    pub attempts: u64,
    pub recoveries: u64,
    pub failures: u64,
}

/// Decides whether a response is worth correcting and with what prompt.
/// Holds no per-chain state: the attempt counter is threaded through every
/// call, so one controller serves all workers and its counters aggregate
/// across the run.
pub struct RetryController {
    settings: RetrySettings,
    attempts: AtomicU64,
    recoveries: AtomicU64,
    failures: AtomicU64,
}

impl RetryController {
    pub fn new(settings: RetrySettings) -> Self {
        Self {
            settings,
            attempts: AtomicU64::new(0),
            recoveries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Judge a parsed response. `attempt` counts corrections already sent
    /// for this position; `response` is the raw text behind `result`.
    pub fn evaluate(
        &self,
        phase: AnalysisPhase,
        result: &ParseResult,
        response: &str,
        attempt: u32,
    ) -> RetryDecision {
        if result.is_complete() {
            if attempt > 0 {
                self.recoveries.fetch_add(1, Ordering::Relaxed);
                debug!(phase = %phase, attempt, "correction recovered a complete record");
            }
            return RetryDecision::Accept;
        }

        let quality = quality_score(response, phase);
        if self
            .settings
            .policy
            .wants_retry(quality, attempt, self.settings.max_attempts)
        {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            debug!(
                phase = %phase,
                quality,
                attempt,
                policy = %self.settings.policy,
                "requesting correction"
            );
            return RetryDecision::Retry {
                correction: correction_prompt(phase, result),
            };
        }

        if attempt > 0 {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        debug!(phase = %phase, quality, attempt, "accepting best-effort parse");
        RetryDecision::Accept
    }

    /// Escalating corrections for an empty response: a nudge, then an
    /// explicit format demand, then a final minimal-JSON demand.
    pub fn empty_response_correction(&self, phase: AnalysisPhase, attempt: u32) -> String {
        match attempt {
            0 => "Your previous reply was empty. Please answer the question above.".to_string(),
            1 => format!(
                "Your previous reply was empty. Respond now, using exactly this format:\n{}",
                prompts::payload_shape(phase)
            ),
            _ => format!(
                "Final attempt. Reply with nothing but minimal JSON in this shape, \
                 leaving fields you cannot determine empty:\n{}",
                prompts::payload_shape(phase)
            ),
        }
    }

    pub fn stats(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Pick the correction text for a non-complete parse: a minimal fragment
/// when exactly one critical field is missing, the full canonical shape
/// when nothing decoded, a schema reminder with the missing list otherwise.
fn correction_prompt(phase: AnalysisPhase, result: &ParseResult) -> String {
    match result {
        ParseResult::Unparseable { .. } => format!(
            "Your response could not be parsed. Reply with exactly this \
             structure and nothing else:\n{}",
            prompts::payload_shape(phase)
        ),
        ParseResult::Partial { missing, .. } if missing.len() == 1 => single_field_correction(missing[0]),
        ParseResult::Partial { missing, .. } => {
            let names: Vec<&str> = missing.iter().map(Field::as_str).collect();
            format!(
                "Your response was missing required fields: {}. Reply with \
                 exactly one JSON object matching the requested schema, \
                 including every listed field.",
                names.join(", ")
            )
        }
        ParseResult::Complete { .. } => String::new(),
    }
}

fn single_field_correction(field: Field) -> String {
    format!(
        "The `{}` field was missing from your response. Send the same \
         analysis again as one JSON object, this time including `{}`.",
        field, field
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MiddleRecord, PhaseRecord, StartRecord};
    use crate::retry::RetryPolicy;

    fn settings(policy: RetryPolicy, max_attempts: u32) -> RetrySettings {
        RetrySettings { policy, max_attempts, empty_response_attempts: 2 }
    }

    fn partial_middle() -> ParseResult {
        ParseResult::from_record(PhaseRecord::Middle(MiddleRecord {
            function: Some("f".into()),
            tainted_vars: Some(vec!["x".into()]),
            ..Default::default()
        }))
    }

    #[test]
    fn test_complete_is_accepted_without_scoring() {
        let controller = RetryController::new(settings(RetryPolicy::Intelligent, 2));
        let result = ParseResult::from_record(PhaseRecord::Start(StartRecord {
            function: Some("main".into()),
            tainted_vars: Some(vec![]),
            ..Default::default()
        }));
        assert!(matches!(
            controller.evaluate(AnalysisPhase::Start, &result, "whatever", 0),
            RetryDecision::Accept
        ));
        assert_eq!(controller.stats().attempts, 0);
    }

    #[test]
    fn test_single_missing_field_gets_minimal_fragment() {
        let controller = RetryController::new(settings(RetryPolicy::Intelligent, 2));
        let decision = controller.evaluate(AnalysisPhase::Middle, &partial_middle(), "junk", 0);
        match decision {
            RetryDecision::Retry { correction } => {
                assert!(correction.contains("`propagation`"));
                assert!(correction.contains("field was missing"));
                // Minimal fragment, not the whole canonical shape.
                assert!(!correction.contains("sink_reached"));
            }
            RetryDecision::Accept => panic!("expected a retry"),
        }
        assert_eq!(controller.stats().attempts, 1);
    }

    #[test]
    fn test_unparseable_gets_full_shape() {
        let controller = RetryController::new(settings(RetryPolicy::Intelligent, 2));
        let result = ParseResult::Unparseable { raw: "???".into() };
        match controller.evaluate(AnalysisPhase::End, &result, "???", 0) {
            RetryDecision::Retry { correction } => {
                assert!(correction.contains("vulnerability_found"));
                assert!(correction.contains("END_FINDINGS="));
            }
            RetryDecision::Accept => panic!("expected a retry"),
        }
    }

    #[test]
    fn test_budget_exhaustion_accepts_and_counts_failure() {
        let controller = RetryController::new(settings(RetryPolicy::Intelligent, 1));
        // attempt 1 with a policy that only corrects attempt 0
        let decision = controller.evaluate(AnalysisPhase::Middle, &partial_middle(), "junk", 1);
        assert!(matches!(decision, RetryDecision::Accept));
        assert_eq!(controller.stats().failures, 1);
    }

    #[test]
    fn test_recovery_counted_when_attempt_produced_complete() {
        let controller = RetryController::new(settings(RetryPolicy::Intelligent, 2));
        let result = ParseResult::from_record(PhaseRecord::Middle(MiddleRecord {
            function: Some("f".into()),
            tainted_vars: Some(vec![]),
            propagation: Some(vec![]),
            ..Default::default()
        }));
        controller.evaluate(AnalysisPhase::Middle, &result, "ok", 1);
        assert_eq!(controller.stats().recoveries, 1);
    }

    #[test]
    fn test_empty_corrections_escalate() {
        let controller = RetryController::new(settings(RetryPolicy::Intelligent, 2));
        let first = controller.empty_response_correction(AnalysisPhase::Start, 0);
        let second = controller.empty_response_correction(AnalysisPhase::Start, 1);
        let third = controller.empty_response_correction(AnalysisPhase::Start, 2);
        assert!(!first.contains("tainted_vars"));
        assert!(second.contains("tainted_vars"));
        assert!(third.contains("Final attempt"));
    }

    #[test]
    fn test_conservative_leaves_mediocre_responses_alone() {
        let controller = RetryController::new(settings(RetryPolicy::Conservative, 2));
        // Markers present, decodes: mediocre-to-good quality, above 0.3.
        let response = r#"{"function": "f", "tainted_vars": ["x"]} FINDINGS={"items": []}"#;
        let decision = controller.evaluate(AnalysisPhase::Middle, &partial_middle(), response, 0);
        assert!(matches!(decision, RetryDecision::Accept));
    }
}
