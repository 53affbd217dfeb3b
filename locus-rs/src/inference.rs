//! Transcript inference seam.
//!
//! The engine only needs `TranscriptInference`; [`CoverageInference`] is the
//! simple implementation the binary ships with.

use crate::alignment::Segment;
use crate::bundle::Bundle;
use crate::guides::GuideTranscript;
use anyhow::Result;
use std::sync::Arc;

/// A transcript reported for one bundle.
#[derive(Debug, Clone)]
pub struct InferredTranscript {
    /// Bundle-local gene index, starting at 0.
    pub gene: usize,
    /// Guide this transcript reproduces, if any.
    pub guide: Option<Arc<GuideTranscript>>,
    pub strand: char,
    pub exons: Vec<Segment>,
    /// Mean per-base read coverage over the exons.
    pub coverage: f64,
    /// Abundance estimate available inside the bundle; replaced after the
    /// whole stream has been read.
    pub abundance: f64,
}

impl InferredTranscript {
    pub fn length(&self) -> u32 {
        self.exons.iter().map(Segment::len).sum()
    }

    pub fn start(&self) -> u32 {
        self.exons.first().map(|e| e.start).unwrap_or(0)
    }

    pub fn end(&self) -> u32 {
        self.exons.last().map(|e| e.end).unwrap_or(0)
    }
}

/// Builds transcripts for a loaded bundle.
///
/// Called concurrently from every worker. `fast` asks for the approximate
/// mode; it is set by configuration or when the bundle hit the coverage cap.
pub trait TranscriptInference: Sync {
    fn infer(&self, bundle: &Bundle, fast: bool) -> Result<Vec<InferredTranscript>>;
}

/// Coverage-driven inference.
///
/// Guided bundles report each kept guide with read coverage on its exons.
/// Unguided bundles report one transcript per group of covered blocks linked
/// by observed junctions. Outside approximate mode, transcripts below
/// `min_coverage` are dropped.
#[derive(Debug, Clone)]
pub struct CoverageInference {
    pub min_coverage: f64,
}

impl Default for CoverageInference {
    fn default() -> Self {
        Self { min_coverage: 2.5 }
    }
}

impl TranscriptInference for CoverageInference {
    fn infer(&self, bundle: &Bundle, fast: bool) -> Result<Vec<InferredTranscript>> {
        let mut out = if bundle.guides().is_empty() {
            infer_unguided(bundle)
        } else {
            infer_guided(bundle)
        };
        if !fast {
            out.retain(|t| t.coverage >= self.min_coverage);
        }
        renumber_genes(&mut out);
        Ok(out)
    }
}

fn infer_guided(bundle: &Bundle) -> Vec<InferredTranscript> {
    let mut out = Vec::new();
    let mut gene = 0usize;
    let mut gene_end = 0u32;

    for guide in bundle.guides() {
        if !out.is_empty() && guide.start > gene_end {
            gene += 1;
        }
        gene_end = gene_end.max(guide.end);

        let exons: Vec<Segment> = guide
            .exons
            .iter()
            .map(|e| Segment { start: e.start, end: e.end })
            .collect();
        let coverage = mean_depth(bundle, &exons);
        if coverage <= 0.0 {
            continue;
        }
        out.push(InferredTranscript {
            gene,
            guide: Some(Arc::clone(guide)),
            strand: guide.strand,
            exons,
            coverage,
            abundance: coverage,
        });
    }
    out
}

fn infer_unguided(bundle: &Bundle) -> Vec<InferredTranscript> {
    let blocks = covered_blocks(bundle);
    if blocks.is_empty() {
        return Vec::new();
    }

    // Union blocks joined by a junction whose donor and acceptor fall in them.
    let mut parent: Vec<usize> = (0..blocks.len()).collect();
    let mut strand_votes = vec![(0u32, 0u32); blocks.len()];
    for (junction, &support) in bundle.junctions().iter() {
        let donor = block_containing(&blocks, junction.start.saturating_sub(1));
        let acceptor = block_containing(&blocks, junction.end.saturating_add(1));
        if let (Some(a), Some(b)) = (donor, acceptor) {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            parent[rb] = ra;
            match junction.strand {
                '+' => strand_votes[a].0 += support,
                '-' => strand_votes[a].1 += support,
                _ => {}
            }
        }
    }

    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for idx in 0..blocks.len() {
        let root = find(&mut parent, idx);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(idx),
            None => groups.push((root, vec![idx])),
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(gene, (_, members))| {
            let exons: Vec<Segment> = members.iter().map(|&i| blocks[i]).collect();
            let (plus, minus) = members
                .iter()
                .fold((0, 0), |acc, &i| (acc.0 + strand_votes[i].0, acc.1 + strand_votes[i].1));
            let strand = match plus.cmp(&minus) {
                std::cmp::Ordering::Greater => '+',
                std::cmp::Ordering::Less => '-',
                std::cmp::Ordering::Equal => '.',
            };
            let coverage = mean_depth(bundle, &exons);
            InferredTranscript {
                gene,
                guide: None,
                strand,
                exons,
                coverage,
                abundance: coverage,
            }
        })
        .collect()
}

/// Maximal runs of covered positions, in genomic order.
fn covered_blocks(bundle: &Bundle) -> Vec<Segment> {
    let mut blocks = Vec::new();
    let mut run_start: Option<u32> = None;
    for (offset, &depth) in bundle.coverage().iter().enumerate() {
        let pos = bundle.start() + offset as u32;
        match (depth > 0, run_start) {
            (true, None) => run_start = Some(pos),
            (false, Some(start)) => {
                blocks.push(Segment { start, end: pos - 1 });
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        let end = bundle.start() + bundle.coverage().len() as u32 - 1;
        blocks.push(Segment { start, end });
    }
    blocks
}

fn block_containing(blocks: &[Segment], pos: u32) -> Option<usize> {
    let idx = blocks.partition_point(|b| b.end < pos);
    blocks.get(idx).filter(|b| b.start <= pos).map(|_| idx)
}

fn find(parent: &mut [usize], mut idx: usize) -> usize {
    while parent[idx] != idx {
        parent[idx] = parent[parent[idx]];
        idx = parent[idx];
    }
    idx
}

fn mean_depth(bundle: &Bundle, exons: &[Segment]) -> f64 {
    let len: u64 = exons.iter().map(|e| e.len() as u64).sum();
    if len == 0 {
        return 0.0;
    }
    let total: u64 = exons
        .iter()
        .flat_map(|e| e.start..=e.end)
        .map(|pos| bundle.depth_at(pos) as u64)
        .sum();
    total as f64 / len as f64
}

/// Make gene indices dense after filtering, and order transcripts by
/// (gene, start) so each gene's transcripts are contiguous.
fn renumber_genes(transcripts: &mut [InferredTranscript]) {
    transcripts.sort_by_key(|t| (t.start(), t.end()));
    let mut seen: Vec<usize> = Vec::new();
    for t in transcripts.iter_mut() {
        let dense = match seen.iter().position(|&g| g == t.gene) {
            Some(pos) => pos,
            None => {
                seen.push(t.gene);
                seen.len() - 1
            }
        };
        t.gene = dense;
    }
    transcripts.sort_by_key(|t| (t.gene, t.start(), t.end()));
}
