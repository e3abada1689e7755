use crate::cli::args::{BatchArgs, Cli, Commands, FormatArg, MutantArgs, StatsArgs, StoreArgs};
use crate::core::classify::classify;
use crate::core::engine::{self, BatchConfig, fmt_dur, log_stage, stats_enabled};
use crate::core::model::Verdict;
use crate::core::request::parse_request;
use crate::core::stats::StatsAggregator;
use crate::core::store::{CounterStore, MemoryStore, SqliteStore};
use crate::report::json::{self, MutantResponse, StatsResponse};
use crate::report::summary_txt;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Exit status for a classification that came out human.
pub const EXIT_HUMAN: u8 = 3;

pub fn entry() -> Result<ExitCode> {
    let cli = Cli::parse();
    let t0 = Instant::now();
    // stats never creates a store file
    let create = !matches!(cli.command, Commands::Stats(_));
    let stats = stage(stats_enabled(), "open-store", || open_store(&cli.store, create))?;
    let code = match cli.command {
        Commands::Mutant(args) => mutant(args, &stats),
        Commands::Stats(args) => report_stats(args, &stats).map(|_| ExitCode::SUCCESS),
        Commands::Batch(args) => batch(args, &stats).map(|_| ExitCode::SUCCESS),
    }?;
    if stats_enabled() {
        info!(target: "stats", total = %fmt_dur(t0.elapsed()));
    }
    Ok(code)
}

fn open_store(args: &StoreArgs, create: bool) -> Result<StatsAggregator> {
    let store: Arc<dyn CounterStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else if create {
        Arc::new(SqliteStore::open(&args.store)?)
    } else {
        if !args.store.is_file() {
            bail!("store not found: {}", args.store.display());
        }
        Arc::new(SqliteStore::open_existing(&args.store)?)
    };
    Ok(StatsAggregator::new(store))
}

fn mutant(args: MutantArgs, stats: &StatsAggregator) -> Result<ExitCode> {
    let body = read_input(&args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let verdict = classify_body(&body, args.strict, stats, &mut out)?;
    out.flush()?;
    Ok(ExitCode::from(exit_status(verdict)))
}

/// Classify one request body, record it and write the response.
fn classify_body(
    body: &[u8],
    strict: bool,
    stats: &StatsAggregator,
    out: &mut dyn Write,
) -> Result<Verdict> {
    let grid = parse_request(body, strict)?;
    let verdict = classify(&grid);
    info!(%verdict, size = grid.size(), "classified DNA");
    stats
        .record_sequence(&grid, verdict)
        .with_context(|| "failed to record verdict")?;
    json::write(out, &MutantResponse::from(verdict))?;
    Ok(verdict)
}

fn exit_status(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Mutant => 0,
        Verdict::Human => EXIT_HUMAN,
    }
}

fn read_input(args: &MutantArgs) -> Result<Vec<u8>> {
    if args.input.as_os_str() == "-" {
        let mut body = Vec::new();
        io::stdin()
            .read_to_end(&mut body)
            .with_context(|| "failed to read request from stdin")?;
        return Ok(body);
    }
    if !args.input.is_file() {
        bail!("input file not found: {}", args.input.display());
    }
    fs::read(&args.input).with_context(|| format!("failed to read {}", args.input.display()))
}

fn report_stats(args: StatsArgs, stats: &StatsAggregator) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_stats(args.format, stats, &mut out)?;
    out.flush()?;
    Ok(())
}

fn write_stats(format: FormatArg, stats: &StatsAggregator, out: &mut dyn Write) -> Result<()> {
    let response = StatsResponse::collect(stats).with_context(|| "failed to read statistics")?;
    match format {
        FormatArg::Json => json::write(out, &response),
        FormatArg::Text => summary_txt::write_stats(out, &response),
    }
}

fn batch(args: BatchArgs, stats: &StatsAggregator) -> Result<()> {
    stage(stats_enabled(), "preflight", || {
        if args.input.as_os_str() == "-" {
            bail!("stdin is not supported for batch input; provide a file path");
        }
        if !args.input.is_file() {
            bail!("input file not found: {}", args.input.display());
        }
        if args.threads == 0 {
            bail!("--threads must be >= 1");
        }
        Ok(())
    })?;

    let config = BatchConfig::new(args.input.clone(), args.threads, args.strict);
    let output = engine::run(config, stats)
        .with_context(|| format!("batch failed for {}", args.input.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        FormatArg::Json => json::write(&mut out, &output)?,
        FormatArg::Text => summary_txt::write_batch(&mut out, &output)?,
    }
    out.flush()?;
    Ok(())
}

fn stage<T, F>(enabled: bool, name: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let t = Instant::now();
    let res = f();
    log_stage(enabled, name, t);
    res
}
