use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::PrefixCache;
use crate::config::EngineConfig;
use crate::errors::ChainscanError;
use crate::models::{Chain, FlowRecord, SinkDescriptor};
use crate::oracle::Oracle;
use crate::retry::RetryController;
use crate::trace::{TraceLogger, TraceRecord};
use crate::utils::truncate_error;

use super::analyzer::{ChainAnalyzer, ChainOutcome};
use super::report::{FailedChain, FlowResult, Report};
use super::stats::{EngineStats, RunStats};

/// One unit of work: a chain to walk once, and every input flow that
/// resolves to it.
struct WorkItem {
    chain: Chain,
    vd: SinkDescriptor,
    flow_indices: Vec<usize>,
}

type GroupKey = (Vec<String>, String, String, String);

fn key_of(flow: &FlowRecord) -> GroupKey {
    (
        flow.chains.functions.clone(),
        flow.vd.file.clone(),
        flow.vd.sink.clone(),
        flow.vd.line.to_string(),
    )
}

/// Group flows by (chain, sink) identity, preserving input order. Flows with
/// the same functions but a different sink descriptor get different final
/// prompts, so they stay separate work items.
fn group_unique_chains(flows: &[FlowRecord]) -> Vec<WorkItem> {
    let mut items: Vec<WorkItem> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    for (flow_index, flow) in flows.iter().enumerate() {
        match index.get(&key_of(flow)) {
            Some(&at) => items[at].flow_indices.push(flow_index),
            None => {
                index.insert(key_of(flow), items.len());
                items.push(WorkItem {
                    chain: flow.chains.clone(),
                    vd: flow.vd.clone(),
                    flow_indices: vec![flow_index],
                });
            }
        }
    }
    items
}

/// Number of distinct chain walks a set of flows will need.
pub fn unique_chain_count(flows: &[FlowRecord]) -> usize {
    group_unique_chains(flows).len()
}

/// Failure details kept per work item for fan-out into the report.
struct FailedInfo {
    message: String,
    error_type: &'static str,
}

/// Whether a chain failure means the transport itself is exhausted and the
/// rest of the batch would only burn the same wall.
fn is_transport_exhaustion(error: &ChainscanError) -> bool {
    matches!(
        error.root(),
        ChainscanError::RateLimit(_)
            | ChainscanError::Network(_)
            | ChainscanError::Timeout(_)
            | ChainscanError::OracleApi(_)
    )
}

pub struct BatchResult {
    pub report: Report,
    /// Set when the batch stopped early on transport exhaustion; the report
    /// still covers everything finished before the stop.
    pub abort: Option<ChainscanError>,
}

/// Runs a set of flows across a pool of workers sharing one prefix cache.
pub struct BatchRunner {
    config: EngineConfig,
    oracle: Arc<dyn Oracle>,
    cache: Arc<PrefixCache>,
    retry: Arc<RetryController>,
    stats: Arc<EngineStats>,
    cancel: CancellationToken,
    trace: Option<Arc<TraceLogger>>,
}

impl BatchRunner {
    pub fn new(config: EngineConfig, oracle: Arc<dyn Oracle>) -> Self {
        let cache = Arc::new(PrefixCache::new(config.cache.capacity));
        let retry = Arc::new(RetryController::new(config.retry.clone()));
        Self {
            config,
            oracle,
            cache,
            retry,
            stats: Arc::new(EngineStats::default()),
            cancel: CancellationToken::new(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: TraceLogger) -> Self {
        self.trace = Some(Arc::new(trace));
        self
    }

    /// Token that stops the batch; workers check it between positions.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Live counters, for the progress display.
    pub fn stats_handle(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    fn analyzer(&self) -> ChainAnalyzer {
        ChainAnalyzer::new(
            &self.config,
            Arc::clone(&self.oracle),
            Arc::clone(&self.cache),
            Arc::clone(&self.retry),
            Arc::clone(&self.stats),
            self.cancel.clone(),
        )
    }

    pub async fn run(&self, flows: &[FlowRecord]) -> BatchResult {
        let items = group_unique_chains(flows);
        let workers = self.config.run.workers.max(1);
        info!(
            flows = flows.len(),
            unique_chains = items.len(),
            workers,
            provider = self.oracle.provider_name(),
            "starting batch"
        );

        let mut key_of_flow = vec![usize::MAX; flows.len()];
        for (key, item) in items.iter().enumerate() {
            for &flow_index in &item.flow_indices {
                key_of_flow[flow_index] = key;
            }
        }

        let queue: Arc<Mutex<VecDeque<(usize, WorkItem)>>> =
            Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
        let outcomes: Arc<DashMap<usize, Result<ChainOutcome, FailedInfo>>> =
            Arc::new(DashMap::new());
        let abort: Arc<Mutex<Option<ChainscanError>>> = Arc::new(Mutex::new(None));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let analyzer = self.analyzer();
            let queue = Arc::clone(&queue);
            let outcomes = Arc::clone(&outcomes);
            let abort = Arc::clone(&abort);
            let stats = Arc::clone(&self.stats);
            let cancel = self.cancel.clone();
            let trace = self.trace.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = queue.lock().await.pop_front();
                    let (key, item) = match next {
                        Some(work) => work,
                        None => break,
                    };

                    match analyzer.analyze_chain(&item.chain, &item.vd).await {
                        Ok(outcome) => {
                            stats.chains_analyzed.fetch_add(1, Ordering::Relaxed);
                            info!(
                                chain = %item.chain.path(),
                                decision = outcome.verdict.decision.as_str(),
                                findings = outcome.findings.len(),
                                cached_positions = outcome.cached_positions,
                                "chain analyzed"
                            );
                            if let Some(trace) = &trace {
                                let flow_id = format!(
                                    "flow-{}",
                                    item.flow_indices.first().copied().unwrap_or(key)
                                );
                                let record = TraceRecord {
                                    flow_id,
                                    chain: &outcome.chain,
                                    sink_info: &item.vd,
                                    conversations: &outcome.exchanges,
                                    result: json!({
                                        "decision": outcome.verdict.decision.as_str(),
                                        "vulnerability_type": outcome.verdict.vulnerability_type,
                                        "findings": outcome.findings.len(),
                                        "cached_positions": outcome.cached_positions,
                                    }),
                                };
                                if let Err(e) = trace.log_chain(&record).await {
                                    warn!(error = %e, "failed to write trace record");
                                }
                            }
                            outcomes.insert(key, Ok(outcome));
                        }
                        Err(e) => {
                            stats.chains_failed.fetch_add(1, Ordering::Relaxed);
                            let message = truncate_error(&e.to_string());
                            let error_type = e.root().classify().error_type;
                            error!(
                                chain = %item.chain.path(),
                                error = %message,
                                error_type,
                                "chain failed"
                            );
                            outcomes.insert(key, Err(FailedInfo { message, error_type }));
                            if is_transport_exhaustion(&e) {
                                let mut slot = abort.lock().await;
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                                cancel.cancel();
                            }
                        }
                    }
                }
            }));
        }

        let joined = futures::future::join_all(handles).await;
        for result in &joined {
            if let Err(e) = result {
                error!(error = %e, "worker task panicked");
            }
        }

        let mut results = Vec::new();
        let mut failed = Vec::new();
        for (flow_index, flow) in flows.iter().enumerate() {
            let key = key_of_flow[flow_index];
            match outcomes.get(&key) {
                Some(entry) => match entry.value() {
                    Ok(outcome) => results.push(FlowResult {
                        flow_index,
                        chain: flow.chains.functions.clone(),
                        vd: flow.vd.clone(),
                        is_vulnerable: outcome.verdict.decision.counts_as_vulnerable(),
                        decision: outcome.verdict.decision,
                        vulnerability_type: outcome.verdict.vulnerability_type.clone(),
                        vulnerability_details: outcome.vulnerability_details(),
                        findings: outcome.findings.clone(),
                        chain_analyses: outcome.analyses.clone(),
                        adjustments: outcome.adjustments.clone(),
                    }),
                    Err(info) => failed.push(FailedChain {
                        flow_index,
                        chain: flow.chains.functions.clone(),
                        error: info.message.clone(),
                        error_type: info.error_type,
                    }),
                },
                None => failed.push(FailedChain {
                    flow_index,
                    chain: flow.chains.functions.clone(),
                    error: "cancelled before analysis started".to_string(),
                    error_type: "CancelledError",
                }),
            }
        }

        let mut adjustments: HashMap<String, u64> = HashMap::new();
        for entry in outcomes.iter() {
            if let Ok(outcome) = entry.value() {
                for adjustment in &outcome.adjustments {
                    *adjustments.entry(adjustment.kind().to_string()).or_insert(0) += 1;
                }
            }
        }

        let stats = RunStats {
            engine: self.stats.snapshot(),
            cache: self.cache.stats(),
            retry: self.retry.stats(),
            adjustments,
        };
        info!(
            chains_analyzed = stats.engine.chains_analyzed,
            chains_failed = stats.engine.chains_failed,
            oracle_calls = stats.engine.oracle_calls,
            cache_hits = stats.cache.hits,
            cache_partial_hits = stats.cache.partial_hits,
            retry_recoveries = stats.retry.recoveries,
            "batch complete"
        );
        let report = Report::new(results, failed, stats);

        let abort_error = abort.lock().await.take();
        if let Some(e) = &abort_error {
            error!(error = %e, "batch stopped early; transport exhausted");
        }

        BatchResult {
            report,
            abort: abort_error,
        }
    }
}
