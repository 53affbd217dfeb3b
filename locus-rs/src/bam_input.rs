use crate::alignment::{exons_from_cigar, AlignmentRecord};
use anyhow::{Context, Result};
use noodles::bam;
use noodles::sam::alignment::record::data::field::{Tag, Value};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Mapped alignments of a BAM file, in file order.
///
/// Unmapped records and records without aligned bases are skipped; sort
/// order is left for the bundler to check.
pub struct BamInput<R: Read> {
    reader: bam::io::Reader<R>,
    ref_names: Vec<String>,
    record: bam::Record,
    pub skipped: u64,
}

pub fn open_bam(path: &Path) -> Result<BamInput<impl Read>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open input BAM: {}", path.display()))?;
    let mut reader = bam::io::Reader::new(file);
    let header = reader
        .read_header()
        .with_context(|| format!("failed to read header from: {}", path.display()))?;
    let ref_names = header
        .reference_sequences()
        .keys()
        .map(|name| name.to_string())
        .collect();
    Ok(BamInput { reader, ref_names, record: bam::Record::default(), skipped: 0 })
}

impl<R: Read> BamInput<R> {
    fn convert(&self) -> Result<Option<AlignmentRecord>> {
        let record = &self.record;
        let flags = record.flags();
        if flags.is_unmapped() {
            return Ok(None);
        }
        let (Some(ref_id), Some(start)) = (
            record.reference_sequence_id().transpose()?,
            record.alignment_start().transpose()?,
        ) else {
            return Ok(None);
        };
        let chrom = self
            .ref_names
            .get(ref_id)
            .with_context(|| format!("reference sequence id {ref_id} missing from BAM header"))?;

        let ops = record
            .cigar()
            .iter()
            .map(|op| op.map(|op| (op.kind(), op.len())))
            .collect::<io::Result<Vec<_>>>()?;
        let exons = exons_from_cigar(start.get() as u32, ops);
        if exons.is_empty() {
            return Ok(None);
        }

        let name = record.name().map(|n| n.to_string()).unwrap_or_default();
        let nh = int_tag(record, Tag::ALIGNMENT_HIT_COUNT).unwrap_or(1);
        let hi = int_tag(record, Tag::HIT_INDEX).unwrap_or(0);

        let mut aln = AlignmentRecord::spliced(&name, chrom, exons)
            .with_strand(splice_strand(record))
            .with_hits(nh, hi);
        if flags.is_segmented() {
            aln = aln.with_mate(flags.is_first_segment(), flags.is_mate_unmapped());
        }
        Ok(Some(aln))
    }
}

impl<R: Read> Iterator for BamInput<R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e).context("failed to read BAM record")),
            }
            match self.convert() {
                Ok(Some(aln)) => return Some(Ok(aln)),
                Ok(None) => self.skipped += 1,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Transcription strand from the XS or ts tag, `.` when neither is set.
///
/// `ts` is relative to the read, so it flips on reverse-strand alignments.
fn splice_strand(record: &bam::Record) -> char {
    if let Some(c) = char_tag(record, Tag::new(b'X', b'S')) {
        if c == '+' || c == '-' {
            return c;
        }
    }
    match char_tag(record, Tag::new(b't', b's')) {
        Some('+') if record.flags().is_reverse_complemented() => '-',
        Some('-') if record.flags().is_reverse_complemented() => '+',
        Some(c @ ('+' | '-')) => c,
        _ => '.',
    }
}

fn char_tag(record: &bam::Record, tag: Tag) -> Option<char> {
    let data = record.data();
    let value = data.get(&tag)?.ok()?;
    let c = match value {
        Value::Character(c) => Some(c as char),
        Value::String(s) => s.first().map(|&c| c as char),
        _ => None,
    };
    c
}

fn int_tag(record: &bam::Record, tag: Tag) -> Option<u32> {
    let data = record.data();
    let value = data.get(&tag)?.ok()?;
    value.as_int().and_then(|v| u32::try_from(v).ok())
}
