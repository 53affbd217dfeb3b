//! Reference annotation loading (GTF and GFF3) for guide transcripts.

use crate::alignment::span_len;
use anyhow::{bail, Context, Result};
use noodles::gff::feature::record::Strand;
use noodles::gff::feature::RecordBuf;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Gtf,
    Gff3,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "gtf" => Ok(Self::Gtf),
            "gff" | "gff3" => Ok(Self::Gff3),
            _ => bail!("cannot tell annotation format from extension '.{ext}' (expected .gtf, .gff or .gff3)"),
        }
    }
}

/// Exon bounds, 1-based inclusive as written in GTF/GFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exon {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone)]
pub struct Transcript {
    pub id: String,
    pub seqname: String,
    pub strand: char,
    pub exons: Vec<Exon>,
}

impl Transcript {
    pub fn start(&self) -> u32 {
        self.exons.iter().map(|e| e.start).min().unwrap_or(0)
    }

    pub fn end(&self) -> u32 {
        self.exons.iter().map(|e| e.end).max().unwrap_or(0)
    }

    pub fn length(&self) -> u32 {
        self.exons.iter().map(|e| span_len(e.start, e.end)).sum()
    }
}

/// Load guide transcripts from a GTF or GFF3 file.
///
/// Transcripts without exon features are dropped. The result is ordered by
/// chromosome (in first-seen order), then start, then end, with exons sorted
/// inside each transcript; guide ids are assigned in this order.
pub fn load_transcripts(path: &Path) -> Result<Vec<Transcript>> {
    let format = InputFormat::from_path(path)?;
    let file = File::open(path)
        .with_context(|| format!("failed to open reference annotation {}", path.display()))?;
    let reader = BufReader::new(file);

    let collected = match format {
        InputFormat::Gtf => {
            let mut reader = noodles::gtf::io::Reader::new(reader);
            collect(reader.record_bufs(), format)
        }
        InputFormat::Gff3 => {
            let mut reader = noodles::gff::io::Reader::new(reader);
            collect(reader.record_bufs(), format)
        }
    }
    .with_context(|| format!("failed to load reference annotation {}", path.display()))?;

    let transcripts = collected.into_sorted();
    tracing::debug!(transcripts = transcripts.len(), ?format, "annotation parsed");
    Ok(transcripts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeatureKind {
    Transcript,
    Exon,
}

impl FeatureKind {
    fn classify(ty: &[u8]) -> Option<Self> {
        match ty {
            b"transcript" | b"mRNA" => Some(Self::Transcript),
            b"exon" => Some(Self::Exon),
            _ => None,
        }
    }
}

/// Transcripts in first-seen order, looked up by id.
#[derive(Default)]
struct Collected {
    transcripts: Vec<Transcript>,
    by_id: HashMap<String, usize>,
}

impl Collected {
    fn entry(&mut self, id: &str, record: &RecordBuf) -> &mut Transcript {
        let idx = match self.by_id.get(id) {
            Some(&idx) => idx,
            None => {
                self.transcripts.push(Transcript {
                    id: id.to_string(),
                    seqname: record.reference_sequence_name().to_string(),
                    strand: strand_char(record.strand()),
                    exons: Vec::new(),
                });
                self.by_id.insert(id.to_string(), self.transcripts.len() - 1);
                self.transcripts.len() - 1
            }
        };
        &mut self.transcripts[idx]
    }

    fn into_sorted(self) -> Vec<Transcript> {
        let mut chrom_rank: HashMap<&str, usize> = HashMap::new();
        for tx in &self.transcripts {
            let next = chrom_rank.len();
            chrom_rank.entry(tx.seqname.as_str()).or_insert(next);
        }
        let ranks: Vec<usize> = self
            .transcripts
            .iter()
            .map(|tx| chrom_rank.get(tx.seqname.as_str()).copied().unwrap_or(usize::MAX))
            .collect();

        let mut ranked: Vec<(usize, Transcript)> = ranks
            .into_iter()
            .zip(self.transcripts)
            .filter(|(_, tx)| !tx.exons.is_empty())
            .map(|(rank, mut tx)| {
                tx.exons.sort_by_key(|e| (e.start, e.end));
                (rank, tx)
            })
            .collect();
        ranked.sort_by(|(ra, a), (rb, b)| {
            (ra, a.start(), a.end(), &a.id).cmp(&(rb, b.start(), b.end(), &b.id))
        });
        ranked.into_iter().map(|(_, tx)| tx).collect()
    }
}

fn collect<I>(records: I, format: InputFormat) -> Result<Collected>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
{
    let mut collected = Collected::default();

    for (line, result) in records.enumerate() {
        let record = result?;
        let Some(kind) = FeatureKind::classify(record.ty().as_ref()) else {
            continue;
        };

        let exon = Exon {
            start: u32::try_from(record.start().get())
                .with_context(|| format!("feature {}: start out of range", line + 1))?,
            end: u32::try_from(record.end().get())
                .with_context(|| format!("feature {}: end out of range", line + 1))?,
        };

        // GTF names the transcript on every line; GFF3 links exons to their
        // transcript(s) through Parent.
        let ids = match (format, kind) {
            (InputFormat::Gtf, _) => attribute_values(&record, b"transcript_id"),
            (InputFormat::Gff3, FeatureKind::Transcript) => attribute_values(&record, b"ID"),
            (InputFormat::Gff3, FeatureKind::Exon) => attribute_values(&record, b"Parent"),
        };
        if ids.is_empty() {
            bail!("feature {}: {kind:?} has no transcript id", line + 1);
        }

        for id in &ids {
            let tx = collected.entry(id, &record);
            if kind == FeatureKind::Exon {
                tx.exons.push(exon);
            }
        }
    }

    Ok(collected)
}

fn attribute_values(record: &RecordBuf, key: &[u8]) -> Vec<String> {
    record
        .attributes()
        .get(key)
        .map(|value| value.iter().map(|v| v.to_string()).collect())
        .unwrap_or_default()
}

fn strand_char(strand: Strand) -> char {
    match strand {
        Strand::Forward => '+',
        Strand::Reverse => '-',
        Strand::None => '.',
        Strand::Unknown => '?',
    }
}
