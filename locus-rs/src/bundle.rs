use crate::alignment::AlignmentRecord;
use crate::guides::GuideTranscript;
use crate::types::{HashMap, SlotIdx};
use std::sync::Arc;

/// Lifecycle of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleStatus {
    Free,
    Loading,
    Ready,
    Processing,
}

/// Intron observed in at least one read, 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Junction {
    pub start: u32,
    pub end: u32,
    pub strand: char,
}

/// One genomic locus worth of alignments, reused across loci.
///
/// Clearing keeps the allocated capacity of the read list, the junction map
/// and the coverage vector, so a pool of `W+1` bundles reaches a steady state
/// after the first few loci.
#[derive(Debug, Default)]
pub struct Bundle {
    slot: SlotIdx,
    chrom: String,
    start: u32,
    end: u32,
    reads: Vec<AlignmentRecord>,
    junctions: HashMap<Junction, u32>,
    guides: Vec<Arc<GuideTranscript>>,
    num_fragments: u64,
    frag_len: u64,
    cov_saturated: bool,
    /// Per-base read depth; index 0 is `start`.
    coverage: Vec<u32>,
}

impl Bundle {
    pub fn new(slot: SlotIdx) -> Self {
        Self { slot, ..Self::default() }
    }

    pub(crate) fn open(&mut self, chrom: &str, start: u32, end: u32) {
        self.chrom.clear();
        self.chrom.push_str(chrom);
        self.start = start;
        self.end = end;
    }

    pub(crate) fn extend_end(&mut self, end: u32) {
        self.end = self.end.max(end);
    }

    /// Freeze the bounds and attach the guides overlapping them.
    pub(crate) fn finalize(&mut self, start: u32, end: u32, guides: &[Arc<GuideTranscript>]) {
        if start < self.start && !self.coverage.is_empty() {
            let shift = (self.start - start) as usize;
            self.coverage.splice(0..0, std::iter::repeat_n(0, shift));
        }
        self.start = start;
        self.end = end;
        self.guides.clear();
        self.guides.extend(guides.iter().cloned());
    }

    /// Add a read, capping per-base depth at `max_read_cov`.
    ///
    /// The read is always kept; only its coverage contribution is dropped at
    /// positions that already reached the cap.
    pub(crate) fn add_read(&mut self, record: AlignmentRecord, max_read_cov: u32) {
        for seg in &record.exons {
            if seg.is_empty() || seg.start < self.start {
                continue;
            }
            let lo = (seg.start - self.start) as usize;
            let hi = (seg.end - self.start) as usize;
            if self.coverage.len() <= hi {
                self.coverage.resize(hi + 1, 0);
            }
            for depth in &mut self.coverage[lo..=hi] {
                if *depth >= max_read_cov {
                    self.cov_saturated = true;
                } else {
                    *depth += 1;
                }
            }
        }

        for intron in record.introns() {
            let junction = Junction { start: intron.start, end: intron.end, strand: record.strand };
            *self.junctions.entry(junction).or_insert(0) += 1;
        }

        if record.counts_as_fragment() {
            self.num_fragments += 1;
            self.frag_len += record.aligned_len();
        }

        self.extend_end(record.end);
        self.reads.push(record);
    }

    /// Drop all locus data, keeping allocations.
    pub(crate) fn clear(&mut self) {
        self.chrom.clear();
        self.start = 0;
        self.end = 0;
        self.reads.clear();
        self.junctions.clear();
        self.guides.clear();
        self.num_fragments = 0;
        self.frag_len = 0;
        self.cov_saturated = false;
        self.coverage.clear();
    }

    pub fn slot(&self) -> SlotIdx {
        self.slot
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn reads(&self) -> &[AlignmentRecord] {
        &self.reads
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn junctions(&self) -> &HashMap<Junction, u32> {
        &self.junctions
    }

    pub fn guides(&self) -> &[Arc<GuideTranscript>] {
        &self.guides
    }

    pub fn num_fragments(&self) -> u64 {
        self.num_fragments
    }

    pub fn frag_len(&self) -> u64 {
        self.frag_len
    }

    pub fn cov_saturated(&self) -> bool {
        self.cov_saturated
    }

    /// Read depth at a 1-based position; 0 outside the covered range.
    pub fn depth_at(&self, pos: u32) -> u32 {
        pos.checked_sub(self.start)
            .and_then(|off| self.coverage.get(off as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Per-base depth starting at [`Bundle::start`].
    pub fn coverage(&self) -> &[u32] {
        &self.coverage
    }
}
