use crate::alignment::AlignmentRecord;
use crate::annotation::load_transcripts;
use crate::bam_input::open_bam;
use crate::bundler::{Bundler, BundlerStats};
use crate::cli::Args;
use crate::config::AssemblyConfig;
use crate::counters::{CounterSnapshot, GlobalCounters};
use crate::coverage::GuideCoverage;
use crate::dispatch::{self, Dispatcher, QueueReport};
use crate::guides::GuideIndex;
use crate::inference::{CoverageInference, TranscriptInference};
use crate::merger::{MergeReport, ResultMerger};
use crate::pool::BufferPool;
use crate::worker::{self, WorkerContext, WorkerStats};
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub bundler: BundlerStats,
    pub workers: WorkerStats,
    pub counters: CounterSnapshot,
    pub merge: MergeReport,
    pub queue: QueueReport,
}

/// Run the engine over `records` and write the final GTF to `out`.
///
/// The calling thread reads and bundles; `config.workers` scoped threads
/// run `inference`. Once every worker has joined, the merger rewrites its
/// provisional records with abundances normalized by the run's total
/// fragment length, filling `guide_cov` on the way when given.
pub fn assemble<I, W>(
    config: &AssemblyConfig,
    records: I,
    guides: &GuideIndex,
    inference: &dyn TranscriptInference,
    merger: ResultMerger,
    out: &mut W,
    guide_cov: Option<&mut GuideCoverage>,
) -> Result<RunSummary>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
    W: Write,
{
    crossfire::detect_backoff_cfg();
    let pool = BufferPool::new(config.workers);
    let counters = GlobalCounters::new();
    let (dispatcher, queue) = dispatch::channel(config.workers);
    let ctx = WorkerContext {
        pool: &pool,
        counters: &counters,
        merger: &merger,
        inference,
        fast: config.fast,
    };

    let (produced, joined) = thread::scope(|scope| {
        let handles = worker::spawn(scope, config.workers, ctx, &queue);
        drop(queue);
        let produced = produce(config, &pool, dispatcher, guides, records);
        (produced, worker::join(handles))
    });

    // A worker failure aborts the pool, which the producer then reports as
    // PoolAborted; the worker's error is the cause.
    let ((bundler, queue), workers) = match (produced, joined) {
        (_, Err(e)) => return Err(e.into()),
        (Err(e), Ok(_)) => return Err(e),
        (Ok(produced), Ok(workers)) => (produced, workers),
    };

    let counters = counters.snapshot();
    tracing::info!(
        bundles = bundler.bundles,
        fragments = counters.num_fragments,
        frag_len = counters.frag_len,
        avg_frag_len = counters.average_frag_len(),
        genes = counters.genes,
        "all bundles processed"
    );

    let merge = merger.finalize(counters.frag_len, out, guide_cov)?;
    Ok(RunSummary { bundler, workers, counters, merge, queue })
}

fn produce<I>(
    config: &AssemblyConfig,
    pool: &BufferPool,
    dispatcher: Dispatcher,
    guides: &GuideIndex,
    records: I,
) -> Result<(BundlerStats, QueueReport)>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
{
    let mut bundler = Bundler::new(config, pool, dispatcher, guides);
    for record in records {
        bundler.push(record?)?;
    }
    Ok(bundler.finish()?)
}

/// `<out>.tmp`, next to the output file.
pub fn scratch_path(out: &Path) -> PathBuf {
    let mut name = OsString::from(out.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Command-line entry point: load guides, open the BAM and assemble.
pub fn run(args: &Args, config: &AssemblyConfig) -> Result<RunSummary> {
    let guides = match &args.guide_gff {
        Some(path) => {
            let index = GuideIndex::from_transcripts(load_transcripts(path)?);
            tracing::info!(guides = index.len(), path = %path.display(), "reference transcripts loaded");
            index
        }
        None => GuideIndex::new(),
    };
    let mut guide_cov = args.guide_coverage.as_ref().map(|_| GuideCoverage::new(&guides));
    let mut bam = open_bam(&args.in_bam)?;
    let inference = CoverageInference { min_coverage: config.min_coverage };

    tracing::info!(
        input = %args.in_bam.display(),
        workers = config.workers,
        bundle_gap = config.bundle_gap,
        max_read_cov = config.max_read_cov,
        fast = config.fast,
        "assembly started"
    );

    let summary = match &args.out_gtf {
        Some(path) => {
            let merger = if args.in_memory_scratch {
                ResultMerger::in_memory(&config.label)
            } else {
                let scratch = scratch_path(path);
                ResultMerger::with_scratch_file(&config.label, &scratch).with_context(|| {
                    format!("failed to create scratch file {}", scratch.display())
                })?
            };
            let file = File::create(path)
                .with_context(|| format!("failed to create output GTF {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_header(&mut out)?;
            let summary =
                assemble(config, &mut bam, &guides, &inference, merger, &mut out, guide_cov.as_mut())?;
            out.flush()?;
            summary
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            write_header(&mut out)?;
            let merger = ResultMerger::in_memory(&config.label);
            assemble(config, &mut bam, &guides, &inference, merger, &mut out, guide_cov.as_mut())?
        }
    };

    if bam.skipped > 0 {
        tracing::info!(skipped = bam.skipped, "unmapped or empty alignments skipped");
    }
    if let (Some(path), Some(cov)) = (&args.guide_coverage, &guide_cov) {
        cov.write_to_path(path)?;
        tracing::info!(path = %path.display(), "guide coverage written");
    }
    Ok(summary)
}

fn write_header<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "# locus-rs {}", env!("CARGO_PKG_VERSION"))
}
