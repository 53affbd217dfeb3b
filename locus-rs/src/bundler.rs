//! Partition of a sorted alignment stream into locus bundles.

use crate::alignment::AlignmentRecord;
use crate::config::AssemblyConfig;
use crate::dispatch::{Dispatcher, QueueReport};
use crate::error::{AssemblyError, Result};
use crate::guides::{GuideCursor, GuideIndex};
use crate::pool::BufferPool;
use crate::types::{HashSet, HashSetExt, SlotIdx};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundlerStats {
    /// Records pushed.
    pub records: u64,
    /// Bundles handed to the dispatcher.
    pub bundles: u64,
    /// Bundles released without dispatch because they held no read.
    pub empty_bundles: u64,
    pub chromosomes: u64,
}

#[derive(Debug, Clone, Copy)]
struct OpenBundle {
    slot: SlotIdx,
    start: u32,
    end: u32,
}

/// Single-threaded producer side of the engine.
///
/// Records must arrive grouped by chromosome and, within a chromosome, by
/// non-decreasing start. A record opens a new bundle when it starts more than
/// `bundle_gap` bases past the current bundle end, or on a new chromosome.
/// Bundle bounds always cover every guide that overlaps them.
pub struct Bundler<'a> {
    pool: &'a BufferPool,
    dispatcher: Dispatcher,
    guides: &'a GuideIndex,
    cursor: GuideCursor<'a>,
    bundle_gap: u32,
    max_read_cov: u32,
    chrom: Option<String>,
    seen: HashSet<String>,
    prev_pos: u32,
    current: Option<OpenBundle>,
    stats: BundlerStats,
}

impl<'a> Bundler<'a> {
    pub fn new(
        config: &AssemblyConfig,
        pool: &'a BufferPool,
        dispatcher: Dispatcher,
        guides: &'a GuideIndex,
    ) -> Self {
        Self {
            pool,
            dispatcher,
            guides,
            cursor: GuideCursor::new(&[]),
            bundle_gap: config.bundle_gap,
            max_read_cov: config.max_read_cov,
            chrom: None,
            seen: HashSet::new(),
            prev_pos: 0,
            current: None,
            stats: BundlerStats::default(),
        }
    }

    pub fn push(&mut self, record: AlignmentRecord) -> Result<()> {
        if self.chrom.as_deref() != Some(record.chrom.as_str()) {
            if self.seen.contains(&record.chrom) {
                return Err(AssemblyError::ChromosomeRevisited {
                    chrom: record.chrom,
                    pos: record.start,
                });
            }
            // The open bundle's guides borrow from the old chromosome list.
            self.flush()?;
            self.seen.insert(record.chrom.clone());
            self.cursor.reset(self.guides.chrom(&record.chrom));
            self.chrom = Some(record.chrom.clone());
            self.stats.chromosomes += 1;
        } else if record.start < self.prev_pos {
            return Err(AssemblyError::UnsortedInput {
                chrom: record.chrom,
                pos: record.start,
                prev_pos: self.prev_pos,
            });
        }
        self.prev_pos = record.start;
        self.stats.records += 1;

        let mut open = match self.current {
            Some(open) if record.start <= open.end.saturating_add(self.bundle_gap) => open,
            _ => {
                self.flush()?;
                self.open(&record)?
            }
        };
        if record.end > open.end {
            open.end = record.end;
            self.cursor.absorb(&mut open.start, &mut open.end);
        }
        self.current = Some(open);
        self.pool.bundle(open.slot).add_read(record, self.max_read_cov);
        Ok(())
    }

    /// Dispatch the last bundle and close the queue.
    pub fn finish(mut self) -> Result<(BundlerStats, QueueReport)> {
        self.flush()?;
        let stats = self.stats;
        let report = self.dispatcher.close();
        tracing::debug!(
            records = stats.records,
            bundles = stats.bundles,
            chromosomes = stats.chromosomes,
            "alignment stream exhausted"
        );
        Ok((stats, report))
    }

    fn open(&mut self, record: &AlignmentRecord) -> Result<OpenBundle> {
        let slot = self.pool.acquire_free()?;
        self.pool.mark_loading(slot)?;
        let (start, end) = self.cursor.open(record.start, record.end);
        self.pool.bundle(slot).open(&record.chrom, start, end);
        Ok(OpenBundle { slot, start, end })
    }

    fn flush(&mut self) -> Result<()> {
        let Some(open) = self.current.take() else {
            return Ok(());
        };

        let mut bundle = self.pool.bundle(open.slot);
        if bundle.is_empty() {
            drop(bundle);
            self.stats.empty_bundles += 1;
            return self.pool.release(open.slot);
        }
        bundle.finalize(open.start, open.end, self.cursor.kept());
        tracing::debug!(
            slot = open.slot,
            chrom = bundle.chrom(),
            start = open.start,
            end = open.end,
            reads = bundle.reads().len(),
            guides = bundle.guides().len(),
            "bundle loaded"
        );
        drop(bundle);

        self.pool.mark_ready(open.slot)?;
        self.dispatcher.submit(open.slot)?;
        self.stats.bundles += 1;
        Ok(())
    }
}
