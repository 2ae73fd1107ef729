use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chainscan", version, about = "Chain-scoped taint analysis driven by an LLM oracle")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze candidate flows and write a report
    Analyze(AnalyzeArgs),
    /// Validate a flows file and/or a configuration file without analyzing
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct AnalyzeArgs {
    /// Candidate flows JSON from the upstream static analysis
    #[arg(short, long)]
    pub flows: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Report output path
    #[arg(short, long, default_value = "./chainscan-report.json")]
    pub output: String,

    /// Write the full per-chain conversation trace (JSONL) here
    #[arg(long)]
    pub trace: Option<String>,

    /// Oracle provider: openai, local, openai-compatible
    #[arg(long)]
    pub provider: Option<String>,

    /// Oracle model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Oracle endpoint (required for local providers)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Concurrent chain workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Retry policy: intelligent, aggressive, conservative
    #[arg(long)]
    pub retry_policy: Option<String>,

    /// Prefix cache capacity in entries
    #[arg(long)]
    pub cache_capacity: Option<usize>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Flows file to validate
    #[arg(short, long)]
    pub flows: Option<String>,

    /// Config file to validate
    #[arg(short, long)]
    pub config: Option<String>,
}
