use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, PrefixCache};
use crate::config::EngineConfig;
use crate::consistency::{self, Adjustment};
use crate::conversation::{ConversationContext, Exchange, PromptType};
use crate::errors::{with_transport_retry, ChainscanError, TransportRetryConfig};
use crate::merge::merge_findings;
use crate::models::{
    AnalysisPhase, Chain, Finding, PhaseRecord, PositionAnalysis, SinkDescriptor, TaintSnapshot,
    Verdict,
};
use crate::oracle::Oracle;
use crate::parser::{merge_retry, parse_response, ParseResult};
use crate::prompts;
use crate::retry::{RetryController, RetryDecision};
use crate::utils::truncate_for_log;

use super::stats::EngineStats;

/// Everything produced by one chain walk.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub chain: Vec<String>,
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub analyses: Vec<PositionAnalysis>,
    pub adjustments: Vec<Adjustment>,
    pub exchanges: Vec<Exchange>,
    /// Positions restored from the prefix cache instead of queried.
    pub cached_positions: usize,
}

impl ChainOutcome {
    /// The raw details object from the final position, for the report.
    pub fn vulnerability_details(&self) -> Option<serde_json::Value> {
        self.analyses.iter().rev().find_map(|a| match &a.record {
            PhaseRecord::End(r) => r.details.clone(),
            _ => None,
        })
    }
}

/// Walks one chain position by position: prompt, query, parse, correct,
/// memoize. Several analyzers run concurrently, but within a chain the walk
/// is strictly sequential because each prompt is conditioned on everything
/// established before it.
pub struct ChainAnalyzer {
    oracle: Arc<dyn Oracle>,
    cache: Arc<PrefixCache>,
    retry: Arc<RetryController>,
    transport: TransportRetryConfig,
    empty_attempts: u32,
    stats: Arc<EngineStats>,
    cancel: CancellationToken,
}

impl ChainAnalyzer {
    pub fn new(
        config: &EngineConfig,
        oracle: Arc<dyn Oracle>,
        cache: Arc<PrefixCache>,
        retry: Arc<RetryController>,
        stats: Arc<EngineStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            oracle,
            cache,
            retry,
            transport: TransportRetryConfig {
                max_retries: config.transport.max_retries,
            },
            empty_attempts: config.retry.empty_response_attempts,
            stats,
            cancel,
        }
    }

    /// Analyze one chain to a verdict, resuming from the longest memoized
    /// prefix. Errors carry the function and position they surfaced at.
    pub async fn analyze_chain(
        &self,
        chain: &Chain,
        vd: &SinkDescriptor,
    ) -> Result<ChainOutcome, ChainscanError> {
        if chain.is_empty() {
            return Err(ChainscanError::InvalidInput("empty function chain".into()));
        }
        let functions = &chain.functions;
        let chain_len = functions.len();

        let mut context = ConversationContext::new(prompts::SYSTEM_PROMPT);
        let mut analyses: Vec<PositionAnalysis> = Vec::new();
        let mut findings: Vec<Finding> = Vec::new();
        let mut resume_at = 0usize;

        let (matched, cached) = self.cache.longest_prefix_match(functions).await;
        if let Some(mut entry) = cached {
            if matched == chain_len {
                if let Some(verdict) = entry.verdict.clone() {
                    self.stats.chains_from_cache.fetch_add(1, Ordering::Relaxed);
                    debug!(chain = %chain.path(), "full cache hit");
                    return Ok(ChainOutcome {
                        chain: functions.clone(),
                        verdict,
                        findings: entry.findings,
                        analyses: entry.analyses,
                        adjustments: Vec::new(),
                        exchanges: entry.exchanges,
                        cached_positions: matched,
                    });
                }
                // A full-length prefix without a verdict was saved mid-walk
                // of a longer chain, so its last position was answered as a
                // middle hop. Re-ask that position as the final one.
                debug!(
                    chain = %chain.path(),
                    "cached prefix ends mid-walk; re-asking final position"
                );
                resume_at = matched - 1;
                entry.exchanges.retain(|e| e.position < resume_at);
                entry.taint_states.retain(|t| t.position < resume_at);
                entry.analyses.retain(|a| a.position < resume_at);
            } else {
                resume_at = matched;
            }
            findings = entry
                .analyses
                .iter()
                .flat_map(|a| a.record.findings().iter().cloned())
                .collect();
            analyses = entry.analyses;
            context.restore(entry.exchanges, entry.taint_states);
            debug!(chain = %chain.path(), resume_at, "resuming from cached prefix");
        }
        let cached_positions = resume_at;

        let mut verdict: Option<Verdict> = None;
        let mut adjustments: Vec<Adjustment> = Vec::new();

        for position in resume_at..chain_len {
            if self.cancel.is_cancelled() {
                return Err(ChainscanError::Cancelled);
            }
            let function = functions[position].clone();
            let phase = AnalysisPhase::for_position(position, chain_len);

            let analysis = self
                .resolve_position(&mut context, chain, vd, position, phase)
                .await
                .map_err(|e| e.at_position(&function, position))?;

            if let Some(snapshot) = TaintSnapshot::from_record(&analysis.record, position, &function)
            {
                context.record_taint(snapshot);
            }
            findings.extend(analysis.record.findings().iter().cloned());
            analyses.push(analysis);

            if phase == AnalysisPhase::End {
                if let Some(PhaseRecord::End(end)) =
                    analyses.last().map(|a| a.record.clone())
                {
                    let raw_end_text: String = context
                        .exchanges()
                        .iter()
                        .filter(|e| e.position == position)
                        .map(|e| e.response.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");

                    let merged = merge_findings(std::mem::take(&mut findings));
                    let review = consistency::review(
                        Verdict::from_end(&end),
                        merged,
                        context.taint_states(),
                        &raw_end_text,
                        vd,
                    );
                    findings = review.findings;
                    adjustments = review.adjustments;
                    verdict = Some(review.verdict);
                }
            }

            let entry = CacheEntry {
                prefix: functions[..=position].to_vec(),
                exchanges: context.exchanges().to_vec(),
                taint_states: context.taint_states().to_vec(),
                findings: findings.clone(),
                analyses: analyses.clone(),
                verdict: verdict.clone(),
            };
            self.cache.save_prefix(functions, position, entry).await;
        }

        let verdict = verdict.ok_or_else(|| {
            ChainscanError::Internal("chain walk ended without a final record".into())
        })?;

        Ok(ChainOutcome {
            chain: functions.clone(),
            verdict,
            findings,
            analyses,
            adjustments,
            exchanges: context.exchanges().to_vec(),
            cached_positions,
        })
    }

    /// Resolve one position: initial query, then correction rounds until the
    /// record is complete or the retry policy stops. Partial retry answers
    /// are merged into the original rather than replacing it.
    async fn resolve_position(
        &self,
        context: &mut ConversationContext,
        chain: &Chain,
        vd: &SinkDescriptor,
        position: usize,
        phase: AnalysisPhase,
    ) -> Result<PositionAnalysis, ChainscanError> {
        let function = chain
            .functions
            .get(position)
            .cloned()
            .unwrap_or_default();
        let previous_taint = context.previous_taint_summary();
        let prompt = prompts::initial_prompt(phase, chain, position, vd, previous_taint.as_deref());

        let mut response = self
            .query_with_empty_guard(context, &function, position, phase, prompt, PromptType::Initial)
            .await?;
        let mut result = parse_response(&response, phase);
        let mut attempt: u32 = 0;

        while let RetryDecision::Retry { correction } =
            self.retry.evaluate(phase, &result, &response, attempt)
        {
            attempt += 1;
            response = self
                .query_with_empty_guard(
                    context,
                    &function,
                    position,
                    phase,
                    correction,
                    PromptType::Retry,
                )
                .await?;
            let retried = parse_response(&response, phase);
            result = combine(result, retried, phase);
        }

        let status = result.status();
        let record = result.into_record(phase);
        Ok(PositionAnalysis {
            function,
            position,
            status,
            record,
        })
    }

    /// One protocol-level query with the empty-response guard: an empty
    /// reply triggers escalating corrections before the position fails.
    /// Every exchange is appended to the context, empty ones included, so
    /// the oracle sees what it is being corrected for.
    async fn query_with_empty_guard(
        &self,
        context: &mut ConversationContext,
        function: &str,
        position: usize,
        phase: AnalysisPhase,
        prompt: String,
        prompt_type: PromptType,
    ) -> Result<String, ChainscanError> {
        let mut prompt = prompt;
        let mut prompt_type = prompt_type;

        for attempt in 0..=self.empty_attempts {
            let messages = match prompt_type {
                PromptType::Retry => context.messages_for_retry(&prompt),
                PromptType::Initial => {
                    let fresh = position == 0 && context.is_empty();
                    context.messages_for_new_prompt(&prompt, !fresh)
                }
            };

            self.stats.oracle_calls.fetch_add(1, Ordering::Relaxed);
            let oracle = Arc::clone(&self.oracle);
            let response = with_transport_retry("oracle.complete", &self.transport, || {
                let oracle = Arc::clone(&oracle);
                let messages = messages.clone();
                async move { oracle.complete(&messages).await }
            })
            .await?;

            let is_empty = response.is_empty();
            let content = response.content;
            context.append(Exchange::new(
                function,
                position,
                phase,
                prompt_type,
                prompt.clone(),
                content.clone(),
            ));

            if !is_empty {
                debug!(
                    function,
                    position,
                    phase = %phase,
                    response = %truncate_for_log(&content),
                    "oracle replied"
                );
                return Ok(content);
            }

            self.stats.empty_responses.fetch_add(1, Ordering::Relaxed);
            warn!(function, position, attempt, "empty oracle response");
            if attempt == self.empty_attempts {
                break;
            }
            prompt = self.retry.empty_response_correction(phase, attempt);
            prompt_type = PromptType::Retry;
        }

        Err(ChainscanError::EmptyResponse {
            position,
            attempts: self.empty_attempts,
        })
    }
}

/// Fold a retry parse into the original. An unparseable side contributes
/// nothing; otherwise the records merge field-wise with the retry winning.
fn combine(original: ParseResult, retry: ParseResult, phase: AnalysisPhase) -> ParseResult {
    if matches!(original, ParseResult::Unparseable { .. }) {
        return retry;
    }
    if matches!(retry, ParseResult::Unparseable { .. }) {
        return original;
    }
    let merged = merge_retry(original.into_record(phase), retry.into_record(phase));
    ParseResult::from_record(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, MiddleRecord, StartRecord};

    #[test]
    fn test_combine_merges_partial_with_retry() {
        let original = ParseResult::from_record(PhaseRecord::Middle(MiddleRecord {
            function: Some("helper".into()),
            tainted_vars: Some(vec!["len".into()]),
            ..Default::default()
        }));
        let retry = ParseResult::from_record(PhaseRecord::Middle(MiddleRecord {
            propagation: Some(vec!["len -> n".into()]),
            ..Default::default()
        }));
        let combined = combine(original, retry, AnalysisPhase::Middle);
        assert!(combined.is_complete());
    }

    #[test]
    fn test_combine_ignores_unparseable_retry() {
        let original = ParseResult::from_record(PhaseRecord::Start(StartRecord {
            function: Some("main".into()),
            ..Default::default()
        }));
        let retry = ParseResult::Unparseable { raw: "junk".into() };
        let combined = combine(original, retry, AnalysisPhase::Start);
        match combined {
            ParseResult::Partial { missing, .. } => {
                assert_eq!(missing, vec![Field::TaintedVars]);
            }
            other => panic!("expected partial, got {:?}", other.status()),
        }
    }

    #[test]
    fn test_combine_replaces_unparseable_original() {
        let original = ParseResult::Unparseable { raw: "junk".into() };
        let retry = ParseResult::from_record(PhaseRecord::Start(StartRecord {
            function: Some("main".into()),
            tainted_vars: Some(vec![]),
            ..Default::default()
        }));
        assert!(combine(original, retry, AnalysisPhase::Start).is_complete());
    }
}
