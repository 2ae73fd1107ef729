use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use chainscan::config::EngineConfig;
use chainscan::engine::{unique_chain_count, BatchRunner};
use chainscan::errors::ChainscanError;
use chainscan::models::{Chain, Decision, FlowRecord, LineRef, ParseStatus, SinkDescriptor};
use chainscan::oracle::{Message, Oracle, OracleResponse};

/// Oracle that answers from a substring-keyed script. Each call is matched
/// against the last user message; the first key contained in it wins.
struct ScriptedOracle {
    scripts: Vec<(String, String)>,
    calls: AtomicU64,
}

impl ScriptedOracle {
    fn new(scripts: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            calls: AtomicU64::new(0),
        })
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, messages: &[Message]) -> Result<OracleResponse, ChainscanError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let content = self
            .scripts
            .iter()
            .find(|(key, _)| prompt.contains(key))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| {
                ChainscanError::Internal(format!("no script for prompt: {:.120}", prompt))
            })?;
        Ok(OracleResponse {
            content,
            input_tokens: None,
            output_tokens: None,
            model: "scripted".into(),
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn config(workers: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.run.workers = workers;
    config.transport.max_retries = 0;
    config
}

fn flow(functions: &[&str]) -> FlowRecord {
    FlowRecord {
        vd: SinkDescriptor {
            file: "src/io.c".into(),
            line: LineRef::Single(42),
            sink: "memcpy".into(),
            param_index: Some(2),
            param_indices: vec![],
        },
        chains: Chain {
            functions: functions.iter().map(|s| s.to_string()).collect(),
            call_sites: vec![],
        },
    }
}

fn start_payload(function: &str, var: &str, dest: &str) -> String {
    format!(
        r#"{{"function": "{function}", "tainted_vars": ["{var}"], "propagation": ["{var} -> {dest}"], "sanitizers": [], "rationale": "reads external data"}}
FINDINGS={{"items": []}}"#
    )
}

fn middle_payload(function: &str, var: &str) -> String {
    format!(
        r#"{{"function": "{function}", "tainted_vars": ["{var}"], "propagation": ["{var} -> n"], "sanitizers": [], "sink_reached": false, "rationale": "passes data along"}}
FINDINGS={{"items": []}}"#
    )
}

const END_VULNERABLE: &str = r#"{"vulnerability_found": true}
{"vulnerability_type": "CWE-120", "vulnerable_lines": "src/io.c:42", "severity": "high", "decision_rationale": "unbounded copy of tainted length"}
END_FINDINGS={"items": [{"file": "src/io.c", "line": 42, "function": "copy_buffer", "sink_function": "memcpy", "rule_matches": {"rule_id": "buffer-overflow", "others": []}, "rationale": "tainted length reaches memcpy"}]}"#;

const END_CLEAN: &str = r#"{"vulnerability_found": false}
{"why_no_vulnerability": "length is clamped before the copy", "decision_rationale": "bounds check at the call site"}
END_FINDINGS={"items": []}"#;

#[tokio::test]
async fn test_chain_walk_reaches_vulnerable_verdict() {
    let start = start_payload("main", "argv", "cmd");
    let middle = middle_payload("parse_input", "buf");
    let oracle = ScriptedOracle::new(&[
        ("Position 1 of 3: `main`", &start),
        ("Position 2 of 3: `parse_input`", &middle),
        ("Position 3 of 3: `copy_buffer`", END_VULNERABLE),
    ]);
    let flows = vec![flow(&["main", "parse_input", "copy_buffer"])];

    let runner = BatchRunner::new(config(1), oracle.clone() as Arc<dyn Oracle>);
    let batch = runner.run(&flows).await;

    assert!(batch.abort.is_none());
    assert!(batch.report.failed.is_empty());
    assert_eq!(batch.report.results.len(), 1);

    let result = &batch.report.results[0];
    assert_eq!(result.decision, Decision::Vulnerable);
    assert!(result.is_vulnerable);
    assert_eq!(result.vulnerability_type.as_deref(), Some("CWE-120"));
    assert!(result.vulnerability_details.is_some());
    assert_eq!(result.chain_analyses.len(), 3);
    assert!(result
        .chain_analyses
        .iter()
        .all(|a| a.status == ParseStatus::Complete));

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].file, "src/io.c");
    assert_eq!(result.findings[0].line, 42);
    assert_eq!(result.findings[0].sink_function.as_deref(), Some("memcpy"));

    assert_eq!(oracle.calls(), 3);
    assert_eq!(batch.report.stats.engine.oracle_calls, 3);
    assert_eq!(batch.report.stats.cache.misses, 1);
}

#[tokio::test]
async fn test_taint_claims_unsupported_by_origin_markers_flagged() {
    // Tainted names with no untrusted-origin vocabulary anywhere.
    let implausible = start_payload("a", "zz", "qq");
    let oracle = ScriptedOracle::new(&[
        ("Position 1 of 2: `a`", &implausible),
        ("Position 2 of 2: `b`", END_VULNERABLE),
    ]);
    let flows = vec![flow(&["a", "b"])];
    let batch = BatchRunner::new(config(1), oracle as Arc<dyn Oracle>)
        .run(&flows)
        .await;

    let result = &batch.report.results[0];
    assert_eq!(result.decision, Decision::Vulnerable);
    let kinds: Vec<&str> = result.adjustments.iter().map(|a| a.kind()).collect();
    assert!(kinds.contains(&"unsupported_sink_claim"), "got {:?}", kinds);
    assert_eq!(
        batch.report.stats.adjustments.get("unsupported_sink_claim"),
        Some(&1)
    );

    // The same verdict grounded in parameter-derived taint is not flagged.
    let plausible = start_payload("a", "argv", "cmd");
    let oracle = ScriptedOracle::new(&[
        ("Position 1 of 2: `a`", &plausible),
        ("Position 2 of 2: `b`", END_VULNERABLE),
    ]);
    let batch = BatchRunner::new(config(1), oracle as Arc<dyn Oracle>)
        .run(&flows)
        .await;
    assert!(batch.report.results[0].adjustments.is_empty());
}

#[tokio::test]
async fn test_shared_prefix_resumes_from_cache() {
    let start = start_payload("main", "argv", "cmd");
    let middle = middle_payload("helper", "buf");
    let oracle = ScriptedOracle::new(&[
        ("Position 1 of 3: `main`", &start),
        ("Position 2 of 3: `helper`", &middle),
        ("`sink_a`", END_VULNERABLE),
        ("`sink_b`", END_CLEAN),
    ]);
    let flows = vec![
        flow(&["main", "helper", "sink_a"]),
        flow(&["main", "helper", "sink_b"]),
    ];

    let runner = BatchRunner::new(config(1), oracle.clone() as Arc<dyn Oracle>);
    let batch = runner.run(&flows).await;

    // Three queries for the first chain, one for the second: its two-hop
    // prefix is replayed from the cache and only the verdict is re-asked.
    assert_eq!(oracle.calls(), 4);
    assert_eq!(batch.report.stats.cache.partial_hits, 1);
    assert_eq!(batch.report.stats.cache.hits, 0);

    assert_eq!(batch.report.results.len(), 2);
    assert_eq!(batch.report.results[0].decision, Decision::Vulnerable);
    assert_eq!(batch.report.results[1].decision, Decision::Clean);
    // The resumed chain still reports all three positions.
    assert_eq!(batch.report.results[1].chain_analyses.len(), 3);
}

#[tokio::test]
async fn test_duplicate_flows_fan_out_from_one_analysis() {
    let start = start_payload("main", "argv", "cmd");
    let oracle = ScriptedOracle::new(&[
        ("Position 1 of 2: `main`", &start),
        ("Position 2 of 2: `copy`", END_VULNERABLE),
    ]);
    let flows = vec![flow(&["main", "copy"]), flow(&["main", "copy"])];
    assert_eq!(unique_chain_count(&flows), 1);

    let runner = BatchRunner::new(config(2), oracle.clone() as Arc<dyn Oracle>);
    let batch = runner.run(&flows).await;

    assert_eq!(oracle.calls(), 2);
    assert_eq!(batch.report.stats.engine.chains_analyzed, 1);
    assert_eq!(batch.report.results.len(), 2);
    assert_eq!(batch.report.results[0].flow_index, 0);
    assert_eq!(batch.report.results[1].flow_index, 1);
    assert_eq!(batch.report.results[0].decision, Decision::Vulnerable);
    assert_eq!(batch.report.results[1].decision, Decision::Vulnerable);
}

#[tokio::test]
async fn test_empty_responses_fail_one_chain_not_the_batch() {
    let start = start_payload("main", "argv", "cmd");
    let oracle = ScriptedOracle::new(&[
        ("Position 1 of 2: `main`", &start),
        ("Position 2 of 2: `copy`", END_VULNERABLE),
        ("`broken`", ""),
        ("Your previous reply was empty", ""),
    ]);
    let flows = vec![flow(&["main", "copy"]), flow(&["broken"])];

    let runner = BatchRunner::new(config(1), oracle.clone() as Arc<dyn Oracle>);
    let batch = runner.run(&flows).await;

    // Initial query plus two escalating corrections, all empty.
    assert_eq!(oracle.calls(), 5);
    assert_eq!(batch.report.stats.engine.empty_responses, 3);
    assert_eq!(batch.report.stats.engine.chains_failed, 1);

    assert_eq!(batch.report.results.len(), 1);
    assert_eq!(batch.report.results[0].flow_index, 0);
    assert_eq!(batch.report.failed.len(), 1);
    assert_eq!(batch.report.failed[0].flow_index, 1);
    assert_eq!(batch.report.failed[0].error_type, "EmptyResponseError");
    // A content failure never aborts the rest of the batch.
    assert!(batch.abort.is_none());
}

#[tokio::test]
async fn test_missing_field_correction_recovers() {
    let start = start_payload("main", "argv", "cmd");
    // Middle answer with no propagation at all; one corrective round
    // supplies just the missing field and the merge completes the record.
    let partial_middle = r#"{"function": "parse_input", "tainted_vars": ["buf"]}
FINDINGS={"items": []}"#;
    let correction = r#"{"function": "parse_input", "propagation": ["buf -> n"]}"#;
    let oracle = ScriptedOracle::new(&[
        ("Position 1 of 3: `main`", &start),
        ("Position 2 of 3: `parse_input`", partial_middle),
        ("field was missing", correction),
        ("Position 3 of 3: `copy_buffer`", END_VULNERABLE),
    ]);
    let flows = vec![flow(&["main", "parse_input", "copy_buffer"])];

    let runner = BatchRunner::new(config(1), oracle.clone() as Arc<dyn Oracle>);
    let batch = runner.run(&flows).await;

    assert_eq!(oracle.calls(), 4);
    assert_eq!(batch.report.stats.retry.attempts, 1);
    assert_eq!(batch.report.stats.retry.recoveries, 1);

    let result = &batch.report.results[0];
    assert_eq!(result.decision, Decision::Vulnerable);
    assert_eq!(result.chain_analyses[1].status, ParseStatus::Complete);
}
