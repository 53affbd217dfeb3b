use noodles::sam::alignment::record::cigar::op::Kind as CigarKind;

/// Reference interval covered by one aligned block, 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u32,
    pub end: u32,
}

/// Bases in the 1-based inclusive interval `start..=end`, 0 when inverted.
pub fn span_len(start: u32, end: u32) -> u32 {
    end.checked_sub(start).map_or(0, |d| d.saturating_add(1))
}

impl Segment {
    pub fn len(&self) -> u32 {
        span_len(self.start, self.end)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// One mapped alignment as consumed by the bundler.
///
/// Records must arrive grouped by `chrom` (first-seen order) with
/// non-decreasing `start` inside each chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub name: String,
    pub chrom: String,
    /// 1-based, inclusive.
    pub start: u32,
    /// 1-based, inclusive.
    pub end: u32,
    /// Splice strand: '+', '-' or '.' when unknown.
    pub strand: char,
    /// Number of reported alignments for this read (NH), at least 1.
    pub nh: u32,
    /// Alignment instance index (HI), 0 when absent.
    pub hi: u32,
    pub paired: bool,
    pub first_mate: bool,
    pub mate_unmapped: bool,
    pub exons: Vec<Segment>,
}

impl AlignmentRecord {
    /// Unspliced single-end alignment covering `[start, end]`.
    pub fn unspliced(name: &str, chrom: &str, start: u32, end: u32) -> Self {
        Self::spliced(name, chrom, vec![Segment { start, end }])
    }

    /// Single-end alignment made of the given exon blocks, in genomic order.
    pub fn spliced(name: &str, chrom: &str, exons: Vec<Segment>) -> Self {
        let start = exons.first().map(|s| s.start).unwrap_or(0);
        let end = exons.last().map(|s| s.end).unwrap_or(start);
        Self {
            name: name.to_string(),
            chrom: chrom.to_string(),
            start,
            end,
            strand: '.',
            nh: 1,
            hi: 0,
            paired: false,
            first_mate: false,
            mate_unmapped: false,
            exons,
        }
    }

    pub fn with_strand(mut self, strand: char) -> Self {
        self.strand = strand;
        self
    }

    pub fn with_hits(mut self, nh: u32, hi: u32) -> Self {
        self.nh = nh.max(1);
        self.hi = hi;
        self
    }

    pub fn with_mate(mut self, first_mate: bool, mate_unmapped: bool) -> Self {
        self.paired = true;
        self.first_mate = first_mate;
        self.mate_unmapped = mate_unmapped;
        self
    }

    /// Number of reference bases covered by aligned blocks.
    pub fn aligned_len(&self) -> u64 {
        self.exons.iter().map(|s| s.len() as u64).sum()
    }

    /// Introns implied by consecutive exon blocks, 1-based inclusive.
    pub fn introns(&self) -> impl Iterator<Item = Segment> + '_ {
        self.exons.windows(2).map(|w| Segment {
            start: w[0].end.saturating_add(1),
            end: w[1].start.saturating_sub(1),
        })
    }

    /// Whether this alignment adds a fragment to the totals.
    ///
    /// Only the primary instance of a read counts, and a mapped pair counts
    /// once, through its first mate (or its second mate when the first is
    /// unmapped).
    pub fn counts_as_fragment(&self) -> bool {
        if self.hi > 1 {
            return false;
        }
        !self.paired || self.first_mate || self.mate_unmapped
    }
}

/// Split a CIGAR into exon blocks starting at the 1-based `start`.
///
/// `N` operations split exons (splice junctions); deletions stay inside a block.
pub fn exons_from_cigar<I>(start: u32, ops: I) -> Vec<Segment>
where
    I: IntoIterator<Item = (CigarKind, usize)>,
{
    let mut ref_pos = start;
    let mut exon_start = ref_pos;
    let mut exons: Vec<Segment> = Vec::new();

    for (kind, len) in ops {
        let n = u32::try_from(len).unwrap_or(u32::MAX);
        match kind {
            CigarKind::Match
            | CigarKind::SequenceMatch
            | CigarKind::SequenceMismatch
            | CigarKind::Deletion => {
                ref_pos = ref_pos.saturating_add(n);
            }
            CigarKind::Skip => {
                if ref_pos > exon_start {
                    exons.push(Segment { start: exon_start, end: ref_pos - 1 });
                }
                ref_pos = ref_pos.saturating_add(n);
                exon_start = ref_pos;
            }
            // Non-reference-consuming: Insertion, SoftClip, HardClip, Pad
            _ => {}
        }
    }

    if ref_pos > exon_start {
        exons.push(Segment { start: exon_start, end: ref_pos - 1 });
    }

    exons
}
