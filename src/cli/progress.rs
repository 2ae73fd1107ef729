use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::engine::EngineStats;

/// Batch-level progress bar fed from the shared engine counters.
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total_chains: u64) -> Self {
        let bar = ProgressBar::new(total_chains);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:30.cyan/dark_gray} {pos}/{len} chains | {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Poll the counters until the returned token is cancelled, then clear
    /// the bar.
    pub fn watch(self, stats: Arc<EngineStats>) -> CancellationToken {
        let token = CancellationToken::new();
        let watcher = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = watcher.cancelled() => {
                        self.bar.finish_and_clear();
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {
                        let snap = stats.snapshot();
                        self.bar.set_position(snap.chains_analyzed + snap.chains_failed);
                        self.bar.set_message(format!(
                            "{} oracle calls, {} failed",
                            snap.oracle_calls, snap.chains_failed
                        ));
                    }
                }
            }
        });
        token
    }
}
