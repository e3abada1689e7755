use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mutant-scan", version, about = "Detect mutant DNA and keep classification statistics")]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify one request body ({"dna": [...]}) and record the verdict
    Mutant(MutantArgs),
    /// Print the recorded mutant/human counts and their ratio
    Stats(StatsArgs),
    /// Classify and record a JSON-lines file of request bodies
    Batch(BatchArgs),
}

#[derive(Args)]
pub struct StoreArgs {
    /// SQLite file holding the counters
    #[arg(long, global = true, env = "MUTANT_STORE", default_value = "mutant-stats.db")]
    pub store: PathBuf,

    /// Keep counters in memory only; takes precedence over --store
    #[arg(long, global = true, default_value_t = false)]
    pub memory: bool,
}

#[derive(Parser)]
pub struct MutantArgs {
    /// Request body file, or - for stdin
    pub input: PathBuf,

    /// Reject letters other than A, C, G, T
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Parser)]
pub struct StatsArgs {
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    pub format: FormatArg,
}

#[derive(Parser)]
pub struct BatchArgs {
    /// JSON-lines file, plain or gzip
    pub input: PathBuf,

    #[arg(long, default_value_t = num_cpus::get())]
    pub threads: usize,

    #[arg(long, default_value_t = false)]
    pub strict: bool,

    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    pub format: FormatArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    #[value(name = "json")]
    Json,
    #[value(name = "text")]
    Text,
}
