use std::path::PathBuf;

use tracing::info;

use crate::cli::commands::ValidateArgs;
use crate::config;
use crate::errors::ChainscanError;

/// Check inputs without touching the oracle. `load_config` already runs
/// schema and semantic validation, so loading is the check.
pub async fn handle_validate(args: ValidateArgs) -> Result<(), ChainscanError> {
    if args.flows.is_none() && args.config.is_none() {
        return Err(ChainscanError::InvalidInput(
            "nothing to validate; pass --flows and/or --config".into(),
        ));
    }

    if let Some(path) = &args.config {
        let config = config::load_config(&PathBuf::from(path)).await?;
        info!(provider = %config.oracle.provider, workers = config.run.workers, "config parsed");
        println!("configuration ok: {}", path);
    }

    if let Some(path) = &args.flows {
        let count = config::validate_flows(&PathBuf::from(path)).await?;
        println!("flows ok: {} ({} flows)", path, count);
    }

    Ok(())
}
