use clap::Parser;
use tracing_subscriber::EnvFilter;

use chainscan::cli::{self, Cli, Commands};
use chainscan::ChainscanError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        Commands::Analyze(args) => cli::analyze::handle_analyze(args, cli.quiet).await,
        Commands::Validate(args) => cli::validate::handle_validate(args).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match e.root() {
                ChainscanError::Config(_) => 2,
                ChainscanError::Authentication(_) => 4,
                ChainscanError::InvalidInput(_) => 5,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    }
}
