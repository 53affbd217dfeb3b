//! Reference (guide) transcripts indexed per chromosome, and the monotone
//! cursor the bundler uses to pull overlapping guides into a locus.

use crate::alignment::span_len;
use crate::annotation::{Exon, Transcript};
use crate::types::{GuideId, HashMap, HashMapExt};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideTranscript {
    /// 1-based, assigned in sorted load order.
    pub id: GuideId,
    pub name: String,
    pub chrom: String,
    pub strand: char,
    pub start: u32,
    pub end: u32,
    pub exons: Vec<Exon>,
}

impl GuideTranscript {
    pub fn length(&self) -> u32 {
        self.exons.iter().map(|e| span_len(e.start, e.end)).sum()
    }
}

/// Guides grouped by chromosome, each list sorted by (start, end).
#[derive(Debug, Default)]
pub struct GuideIndex {
    all: Vec<Arc<GuideTranscript>>,
    by_chrom: HashMap<String, Vec<Arc<GuideTranscript>>>,
}

impl GuideIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign ids in the order given; `transcripts` is expected to come from
    /// [`crate::annotation::load_transcripts`], which already sorts them.
    pub fn from_transcripts(transcripts: Vec<Transcript>) -> Self {
        let mut all = Vec::with_capacity(transcripts.len());
        let mut by_chrom: HashMap<String, Vec<Arc<GuideTranscript>>> = HashMap::new();

        for (idx, tx) in transcripts.into_iter().enumerate() {
            let guide = Arc::new(GuideTranscript {
                id: (idx + 1) as GuideId,
                start: tx.start(),
                end: tx.end(),
                name: tx.id,
                chrom: tx.seqname,
                strand: tx.strand,
                exons: tx.exons,
            });
            by_chrom
                .entry(guide.chrom.clone())
                .or_default()
                .push(Arc::clone(&guide));
            all.push(guide);
        }

        for list in by_chrom.values_mut() {
            list.sort_by_key(|g| (g.start, g.end));
        }

        Self { all, by_chrom }
    }

    pub fn chrom(&self, chrom: &str) -> &[Arc<GuideTranscript>] {
        self.by_chrom.get(chrom).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, id: GuideId) -> Option<&Arc<GuideTranscript>> {
        let idx = (id as usize).checked_sub(1)?;
        self.all.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<GuideTranscript>> {
        self.all.iter()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Two forward-only indices into one chromosome's guide list.
///
/// `first..next` is the run of guides kept by the bundle being loaded. Both
/// indices only move forward while a chromosome is scanned, so a full pass
/// over a chromosome costs O(guides).
#[derive(Debug, Clone)]
pub struct GuideCursor<'a> {
    guides: &'a [Arc<GuideTranscript>],
    first: usize,
    next: usize,
}

impl<'a> GuideCursor<'a> {
    pub fn new(guides: &'a [Arc<GuideTranscript>]) -> Self {
        Self { guides, first: 0, next: 0 }
    }

    /// Switch to another chromosome's guides.
    pub fn reset(&mut self, guides: &'a [Arc<GuideTranscript>]) {
        *self = Self::new(guides);
    }

    /// Start a bundle at `[start, end]` and widen it over overlapping guides.
    ///
    /// Guides ending before `start` are skipped for good.
    pub fn open(&mut self, start: u32, end: u32) -> (u32, u32) {
        self.first = self.next;
        while self.first < self.guides.len() && self.guides[self.first].end < start {
            self.first += 1;
        }
        self.next = self.first;

        let (mut start, mut end) = (start, end);
        self.absorb(&mut start, &mut end);
        (start, end)
    }

    /// Pull in every guide starting at or before `end`, widening the bounds.
    ///
    /// Returns true when at least one guide was absorbed. Absorbing a guide
    /// can move `end`, which can expose further guides; the loop runs until
    /// no guide is left that starts inside the bounds.
    pub fn absorb(&mut self, start: &mut u32, end: &mut u32) -> bool {
        let before = self.next;
        loop {
            let mut end_changed = false;
            while self.next < self.guides.len() && self.guides[self.next].start <= *end {
                let guide = &self.guides[self.next];
                *start = (*start).min(guide.start);
                if guide.end > *end {
                    *end = guide.end;
                    end_changed = true;
                }
                self.next += 1;
            }
            if !end_changed {
                break;
            }
        }
        self.next > before
    }

    /// Guides overlapping the current bundle.
    pub fn kept(&self) -> &'a [Arc<GuideTranscript>] {
        &self.guides[self.first..self.next]
    }
}
