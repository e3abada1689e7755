use crate::core::classify::classify;
use crate::core::io::{CHUNK_SIZE, Chunk, ChunkData, InputSource, MmapSource};
use crate::core::model::Verdict;
use crate::core::request::parse_request;
use crate::core::stats::StatsAggregator;
use anyhow::{Context, Result, anyhow};
use crossbeam_channel as channel;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

pub struct BatchConfig {
    pub input: PathBuf,
    pub threads: usize,
    pub strict: bool,
    pub chunk_size: usize,
}

impl BatchConfig {
    pub fn new(input: PathBuf, threads: usize, strict: bool) -> Self {
        Self {
            input,
            threads,
            strict,
            chunk_size: CHUNK_SIZE,
        }
    }
}

/// Per-batch tallies. `mutant` and `human` count newly stored sequences only.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct BatchOutput {
    pub processed: u64,
    pub mutant: u64,
    pub human: u64,
    pub duplicates: u64,
}

impl BatchOutput {
    fn merge(&mut self, other: &BatchOutput) {
        self.processed += other.processed;
        self.mutant += other.mutant;
        self.human += other.human;
        self.duplicates += other.duplicates;
    }
}

#[derive(Clone, Debug, Default)]
struct WorkerStats {
    chunks: u64,
    bytes: u64,
    parse: Duration,
    classify: Duration,
    record: Duration,
}

/// Classify every request line in `cfg.input` and record it through `stats`.
/// Blank lines are skipped. The first bad line aborts the batch: no new chunks
/// are started, and `run` returns only after every thread has stopped. Lines
/// from chunks already in flight on other workers may still be recorded.
pub fn run(cfg: BatchConfig, stats: &StatsAggregator) -> Result<BatchOutput> {
    let timings = stats_enabled();
    let t_total = Instant::now();

    let t_open = Instant::now();
    let (mut input, mmap_source_opt, kind) = InputSource::open(&cfg.input, cfg.chunk_size)?;
    log_stage(timings, "engine.input_open", t_open);
    info!(input = %cfg.input.display(), ?kind, threads = cfg.threads, "batch started");

    let (chunk_tx, chunk_rx) = channel::bounded::<Chunk>(cfg.threads * 2);
    let (result_tx, result_rx) = channel::unbounded::<BatchOutput>();
    let (err_tx, err_rx) = channel::bounded::<anyhow::Error>(1);
    let (worker_stats_tx, worker_stats_rx) = channel::unbounded::<WorkerStats>();
    let abort = Arc::new(AtomicBool::new(false));

    let producer_err = err_tx.clone();
    let producer_abort = Arc::clone(&abort);
    let producer = thread::spawn(move || {
        loop {
            if producer_abort.load(Ordering::Relaxed) {
                return;
            }
            match input.next_chunk() {
                Ok(Some(chunk)) => {
                    if chunk_tx.send(chunk).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = producer_err.try_send(e);
                    return;
                }
            }
        }
    });

    let mut workers = Vec::with_capacity(cfg.threads);
    let t_workers = Instant::now();
    for _ in 0..cfg.threads {
        let rx = chunk_rx.clone();
        let tx = result_tx.clone();
        let err = err_tx.clone();
        let worker_source = mmap_source_opt.as_ref().map(Arc::clone);
        let stats = stats.clone();
        let stats_tx = worker_stats_tx.clone();
        let strict = cfg.strict;
        let abort = Arc::clone(&abort);
        workers.push(thread::spawn(move || {
            let mut wstats = WorkerStats::default();
            for chunk in rx.iter() {
                if abort.load(Ordering::Relaxed) {
                    break;
                }
                match process_chunk(&chunk, worker_source.as_deref(), strict, &stats, &mut wstats) {
                    Ok(out) => {
                        if tx.send(out).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        abort.store(true, Ordering::Relaxed);
                        let _ = err.try_send(e);
                        break;
                    }
                }
            }
            if timings {
                let _ = stats_tx.send(wstats);
            }
        }));
    }
    log_stage(timings, "engine.spawn_workers", t_workers);
    drop(chunk_rx);
    drop(result_tx);
    drop(err_tx);
    drop(worker_stats_tx);

    let t_collect = Instant::now();
    let mut output = BatchOutput::default();
    let mut failed = None;
    let mut err_open = true;
    loop {
        if err_open {
            channel::select! {
                recv(err_rx) -> err => {
                    match err {
                        Ok(err) => {
                            abort.store(true, Ordering::Relaxed);
                            failed = Some(err);
                            break;
                        }
                        Err(_) => err_open = false,
                    }
                }
                recv(result_rx) -> msg => {
                    match msg {
                        Ok(part) => output.merge(&part),
                        Err(_) => break,
                    }
                }
            }
        } else {
            match result_rx.recv() {
                Ok(part) => output.merge(&part),
                Err(_) => break,
            }
        }
    }
    log_stage(timings, "engine.collect", t_collect);

    let _ = producer.join();
    for worker in workers {
        let _ = worker.join();
    }
    // a worker may have failed after the last result was merged
    if let Some(err) = failed.or_else(|| err_rx.try_recv().ok()) {
        return Err(err);
    }

    if timings {
        let mut total = WorkerStats::default();
        for ws in worker_stats_rx.iter() {
            total.chunks += ws.chunks;
            total.bytes += ws.bytes;
            total.parse += ws.parse;
            total.classify += ws.classify;
            total.record += ws.record;
        }
        info!(
            target: "stats",
            chunks = total.chunks,
            bytes = total.bytes,
            parse = %fmt_dur(total.parse),
            classify = %fmt_dur(total.classify),
            record = %fmt_dur(total.record),
            "worker totals"
        );
    }
    log_stage(timings, "engine.total", t_total);
    info!(
        processed = output.processed,
        mutant = output.mutant,
        human = output.human,
        duplicates = output.duplicates,
        "batch finished"
    );

    Ok(output)
}

fn process_chunk(
    chunk: &Chunk,
    source: Option<&MmapSource>,
    strict: bool,
    stats: &StatsAggregator,
    wstats: &mut WorkerStats,
) -> Result<BatchOutput> {
    let slice = match &chunk.data {
        ChunkData::MmapRange { start, end } => {
            let source =
                source.ok_or_else(|| anyhow!("mmap source missing for chunk {}", chunk.index))?;
            &source.bytes()[*start..*end]
        }
        ChunkData::Owned(data) => data.as_slice(),
    };
    wstats.chunks += 1;
    wstats.bytes += chunk.timing.bytes as u64;

    let mut out = BatchOutput::default();
    for (offset, line) in slice.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let line_no = chunk.first_line + offset;

        let t_parse = Instant::now();
        let grid = parse_request(line, strict).with_context(|| format!("line {}", line_no))?;
        wstats.parse += t_parse.elapsed();

        let t_classify = Instant::now();
        let verdict = classify(&grid);
        wstats.classify += t_classify.elapsed();

        let t_record = Instant::now();
        let stored = stats
            .record_sequence(&grid, verdict)
            .with_context(|| format!("failed to record line {}", line_no))?;
        wstats.record += t_record.elapsed();

        out.processed += 1;
        match (stored, verdict) {
            (false, _) => out.duplicates += 1,
            (true, Verdict::Mutant) => out.mutant += 1,
            (true, Verdict::Human) => out.human += 1,
        }
    }
    Ok(out)
}

/// `MUTANT_STATS=1` turns on per-stage timings.
pub fn stats_enabled() -> bool {
    matches!(std::env::var("MUTANT_STATS").as_deref(), Ok("1"))
}

pub fn log_stage(enabled: bool, name: &str, t: Instant) {
    if enabled {
        info!(target: "stats", stage = name, time = %fmt_dur(t.elapsed()));
    }
}

pub fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}
