use crate::counters::GlobalCounters;
use crate::dispatch::WorkQueue;
use crate::error::{AssemblyError, Result};
use crate::inference::TranscriptInference;
use crate::merger::ResultMerger;
use crate::pool::BufferPool;
use crate::types::{GeneId, SlotIdx};
use std::thread::{Scope, ScopedJoinHandle};

/// Shared state every worker borrows for the duration of the run.
#[derive(Clone, Copy)]
pub struct WorkerContext<'a> {
    pub pool: &'a BufferPool,
    pub counters: &'a GlobalCounters,
    pub merger: &'a ResultMerger,
    pub inference: &'a dyn TranscriptInference,
    pub fast: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub bundles: u64,
    pub transcripts: u64,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.bundles += other.bundles;
        self.transcripts += other.transcripts;
    }
}

/// Aborts the pool if the worker unwinds.
struct AbortOnPanic<'a>(&'a BufferPool);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("worker panicked, aborting pool");
            self.0.abort();
        }
    }
}

/// Drain `queue` until the producer closes it.
///
/// Any failure, a panic included, aborts the pool first, so a producer blocked
/// in [`BufferPool::acquire_free`] wakes up instead of waiting for a slot that
/// will never be released.
pub fn run_worker(id: usize, ctx: WorkerContext<'_>, queue: WorkQueue) -> Result<WorkerStats> {
    let _abort = AbortOnPanic(ctx.pool);
    let mut stats = WorkerStats::default();
    while let Some(slot) = queue.recv() {
        match process_slot(ctx, slot) {
            Ok(transcripts) => {
                stats.bundles += 1;
                stats.transcripts += transcripts as u64;
            }
            Err(e) => {
                tracing::error!(worker = id, slot, error = %e, "worker failed");
                ctx.pool.abort();
                return Err(e);
            }
        }
    }
    tracing::debug!(worker = id, bundles = stats.bundles, "worker done");
    Ok(stats)
}

fn process_slot(ctx: WorkerContext<'_>, slot: SlotIdx) -> Result<usize> {
    ctx.pool.mark_processing(slot)?;
    let produced = {
        let bundle = ctx.pool.bundle(slot);
        ctx.counters.add_bundle(bundle.num_fragments(), bundle.frag_len());

        let fast = ctx.fast || bundle.cov_saturated();
        let transcripts = ctx.inference.infer(&bundle, fast).map_err(|e| {
            AssemblyError::Inference {
                chrom: bundle.chrom().to_string(),
                start: bundle.start(),
                end: bundle.end(),
                reason: format!("{e:#}"),
            }
        })?;

        if !transcripts.is_empty() {
            let genes = transcripts.iter().map(|t| t.gene + 1).max().unwrap_or(0);
            let first_gene: GeneId = ctx.counters.assign_gene_ids(genes);
            ctx.merger.append(bundle.chrom(), first_gene, &transcripts)?;
        }
        tracing::debug!(
            slot,
            chrom = bundle.chrom(),
            start = bundle.start(),
            end = bundle.end(),
            reads = bundle.reads().len(),
            transcripts = transcripts.len(),
            fast,
            "bundle processed"
        );
        transcripts.len()
    };
    ctx.pool.release(slot)?;
    Ok(produced)
}

/// Start `workers` workers inside `scope`, each with its own queue handle.
pub fn spawn<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    workers: usize,
    ctx: WorkerContext<'env>,
    queue: &WorkQueue,
) -> Vec<ScopedJoinHandle<'scope, Result<WorkerStats>>> {
    (0..workers.max(1))
        .map(|id| {
            let queue = queue.clone();
            scope.spawn(move || run_worker(id, ctx, queue))
        })
        .collect()
}

/// Join every worker and sum their stats; the first worker error wins.
///
/// A worker that panicked is resumed on the calling thread.
pub fn join(handles: Vec<ScopedJoinHandle<'_, Result<WorkerStats>>>) -> Result<WorkerStats> {
    let mut total = WorkerStats::default();
    let mut first_err = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(stats)) => total.merge(stats),
            Ok(Err(e)) => {
                first_err.get_or_insert(e);
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(total),
    }
}
