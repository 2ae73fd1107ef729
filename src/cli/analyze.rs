use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tracing::{info, warn};

use crate::cli::commands::AnalyzeArgs;
use crate::cli::progress::BatchProgress;
use crate::config::{self, EngineConfig};
use crate::engine::{unique_chain_count, BatchRunner, Report};
use crate::errors::ChainscanError;
use crate::models::Decision;
use crate::oracle;
use crate::retry::RetryPolicy;
use crate::trace::TraceLogger;

pub async fn handle_analyze(args: AnalyzeArgs, quiet: bool) -> Result<(), ChainscanError> {
    let mut config = match &args.config {
        Some(path) => config::load_config(&PathBuf::from(path)).await?,
        None => EngineConfig::default(),
    };
    apply_overrides(&mut config, &args)?;
    config.validate()?;

    let flows = config::load_flows(&PathBuf::from(&args.flows)).await?;
    let total_chains = unique_chain_count(&flows);
    info!(
        flows = flows.len(),
        unique_chains = total_chains,
        provider = %config.oracle.provider,
        "flows loaded"
    );

    let api_key = config.oracle.resolve_api_key()?;
    let oracle = oracle::create_oracle(
        &config.oracle.provider,
        &api_key,
        config.oracle.model.as_deref(),
        config.oracle.base_url.as_deref(),
        config.oracle.max_tokens,
    )?;

    let mut runner = BatchRunner::new(config, Arc::from(oracle));
    if let Some(trace_path) = &args.trace {
        let trace = TraceLogger::new(Path::new(trace_path));
        trace.initialize().await?;
        runner = runner.with_trace(trace);
    }

    // Ctrl-C stops the batch; the report still covers finished chains.
    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight positions");
            cancel.cancel();
        }
    });

    let progress = if quiet {
        None
    } else {
        Some(BatchProgress::new(total_chains as u64).watch(runner.stats_handle()))
    };

    let batch = runner.run(&flows).await;
    if let Some(watcher) = progress {
        watcher.cancel();
    }

    let output = PathBuf::from(&args.output);
    batch.report.write(&output).await?;
    if !quiet {
        print_summary(&batch.report, &output);
    }

    match batch.abort {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn apply_overrides(config: &mut EngineConfig, args: &AnalyzeArgs) -> Result<(), ChainscanError> {
    if let Some(provider) = &args.provider {
        config.oracle.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.oracle.model = Some(model.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.oracle.base_url = Some(base_url.clone());
    }
    if let Some(workers) = args.workers {
        config.run.workers = workers;
    }
    if let Some(capacity) = args.cache_capacity {
        config.cache.capacity = capacity;
    }
    if let Some(policy) = &args.retry_policy {
        config.retry.policy = match policy.as_str() {
            "intelligent" => RetryPolicy::Intelligent,
            "aggressive" => RetryPolicy::Aggressive,
            "conservative" => RetryPolicy::Conservative,
            other => {
                return Err(ChainscanError::Config(format!(
                    "Invalid retry policy: {}",
                    other
                )))
            }
        };
    }
    Ok(())
}

fn print_summary(report: &Report, output: &Path) {
    let vulnerable = report.decision_count(Decision::Vulnerable);
    let suspected = report.decision_count(Decision::Suspected);
    let clean = report.decision_count(Decision::Clean);

    println!();
    println!(
        "  {} vulnerable, {} suspected, {} clean, {} failed",
        style(vulnerable).red().bold(),
        style(suspected).yellow(),
        style(clean).green(),
        style(report.failed.len()).dim(),
    );
    let stats = &report.stats;
    println!(
        "  {} oracle calls | cache: {} full, {} partial hits | {} retries recovered",
        stats.engine.oracle_calls,
        stats.cache.hits,
        stats.cache.partial_hits,
        stats.retry.recoveries,
    );
    println!("  report: {}", style(output.display()).cyan());
}
