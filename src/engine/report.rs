use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::consistency::Adjustment;
use crate::errors::ChainscanError;
use crate::models::{Decision, Finding, PositionAnalysis, SinkDescriptor};

use super::stats::RunStats;

/// Outcome for one input flow. Flows sharing a chain are analyzed once and
/// fanned back out, so each keeps its own `flow_index` and sink descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_index: usize,
    pub chain: Vec<String>,
    pub vd: SinkDescriptor,
    pub is_vulnerable: bool,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_type: Option<String>,
    /// Raw details object from the final position, as the oracle wrote it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_details: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    pub chain_analyses: Vec<PositionAnalysis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adjustments: Vec<Adjustment>,
}

/// A flow whose chain could not be analyzed. Failure of one chain never
/// hides the others; failed flows ride along in the same report.
#[derive(Debug, Clone, Serialize)]
pub struct FailedChain {
    pub flow_index: usize,
    pub chain: Vec<String>,
    pub error: String,
    pub error_type: &'static str,
}

/// The report envelope. Written at the end of every run, aborted or not.
#[derive(Debug, Serialize)]
pub struct Report {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<FlowResult>,
    pub failed: Vec<FailedChain>,
    pub stats: RunStats,
}

impl Report {
    pub fn new(results: Vec<FlowResult>, failed: Vec<FailedChain>, stats: RunStats) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            results,
            failed,
            stats,
        }
    }

    pub fn vulnerable_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_vulnerable).count()
    }

    pub fn decision_count(&self, decision: Decision) -> usize {
        self.results.iter().filter(|r| r.decision == decision).count()
    }

    pub async fn write(&self, path: &Path) -> Result<(), ChainscanError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, body).await?;
        info!(
            path = %path.display(),
            results = self.results.len(),
            failed = self.failed.len(),
            "report written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stats::EngineStats;

    fn stats() -> RunStats {
        RunStats {
            engine: EngineStats::default().snapshot(),
            cache: crate::cache::PrefixCache::new(1).stats(),
            retry: crate::retry::RetryController::new(Default::default()).stats(),
            adjustments: Default::default(),
        }
    }

    fn result(flow_index: usize, decision: Decision) -> FlowResult {
        FlowResult {
            flow_index,
            chain: vec!["main".into()],
            vd: SinkDescriptor {
                file: "a.c".into(),
                line: Default::default(),
                sink: "memcpy".into(),
                param_index: None,
                param_indices: vec![],
            },
            is_vulnerable: decision.counts_as_vulnerable(),
            decision,
            vulnerability_type: None,
            vulnerability_details: None,
            findings: vec![],
            chain_analyses: vec![],
            adjustments: vec![],
        }
    }

    #[test]
    fn test_counts() {
        let report = Report::new(
            vec![
                result(0, Decision::Vulnerable),
                result(1, Decision::Suspected),
                result(2, Decision::Clean),
            ],
            vec![],
            stats(),
        );
        assert_eq!(report.vulnerable_count(), 2);
        assert_eq!(report.decision_count(Decision::Clean), 1);
    }

    #[tokio::test]
    async fn test_write_creates_parent_and_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        let report = Report::new(vec![result(0, Decision::Clean)], vec![], stats());
        report.write(&path).await.unwrap();

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["results"][0]["decision"], "clean");
        assert!(value["run_id"].as_str().unwrap().len() > 10);
        assert!(value["stats"]["engine"]["oracle_calls"].is_u64());
    }
}
