//! Two-phase transcript output.
//!
//! Abundance is normalized by the total fragment length of the whole run,
//! which is only known once every bundle has been processed. Workers
//! therefore append provisional records to a scratch store:
//!
//! ```text
//! <lineCount> <length> <transcriptId> <provisionalAbundance> <coverage>
//! <lineCount formatted GTF lines>
//! ```
//!
//! and [`ResultMerger::finalize`] rewrites them with the final value.

use crate::coverage::GuideCoverage;
use crate::error::{AssemblyError, Result};
use crate::inference::InferredTranscript;
use crate::types::{GeneId, GuideId};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Abundance in fragments per kilobase per million, from coverage.
pub fn normalized_abundance(coverage: f64, total_frag_len: u64) -> f64 {
    if total_frag_len == 0 {
        0.0
    } else {
        coverage * 1e9 / total_frag_len as f64
    }
}

/// GTF lines for one transcript: a `transcript` line then one `exon` line per
/// exon. The abundance attribute is added during the final pass.
pub fn format_transcript(
    label: &str,
    chrom: &str,
    gene_id: GeneId,
    tx_no: usize,
    t: &InferredTranscript,
) -> Vec<String> {
    let gene = format!("{label}.{gene_id}");
    let tid = format!("{gene}.{tx_no}");
    let mut lines = Vec::with_capacity(t.exons.len() + 1);

    let mut first = format!(
        "{chrom}\t{label}\ttranscript\t{}\t{}\t1000\t{}\t.\tgene_id \"{gene}\"; transcript_id \"{tid}\";",
        t.start(),
        t.end(),
        t.strand,
    );
    if let Some(guide) = &t.guide {
        let _ = write!(first, " reference_id \"{}\";", guide.name);
    }
    let _ = write!(first, " cov \"{:.6}\";", t.coverage);
    lines.push(first);

    for (i, exon) in t.exons.iter().enumerate() {
        lines.push(format!(
            "{chrom}\t{label}\texon\t{}\t{}\t1000\t{}\t.\tgene_id \"{gene}\"; transcript_id \"{tid}\"; exon_number \"{}\";",
            exon.start,
            exon.end,
            t.strand,
            i + 1,
        ));
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProvisionalHeader {
    line_count: usize,
    length: u32,
    guide_id: GuideId,
    abundance: f64,
    coverage: f64,
}

impl ProvisionalHeader {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!("expected 5 fields, found {}", fields.len()));
        }
        let bad = |name: &str, value: &str| format!("invalid {name} '{value}'");
        Ok(Self {
            line_count: fields[0].parse().map_err(|_| bad("line count", fields[0]))?,
            length: fields[1].parse().map_err(|_| bad("length", fields[1]))?,
            guide_id: fields[2].parse().map_err(|_| bad("transcript id", fields[2]))?,
            abundance: fields[3].parse().map_err(|_| bad("abundance", fields[3]))?,
            coverage: fields[4].parse().map_err(|_| bad("coverage", fields[4]))?,
        })
    }
}

enum Scratch {
    Memory(Vec<u8>),
    File { path: PathBuf, writer: BufWriter<File> },
}

impl Scratch {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Scratch::Memory(buf) => buf,
            Scratch::File { writer, .. } => writer,
        }
    }
}

/// Totals of the final pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub transcripts: u64,
    pub guided: u64,
}

pub struct ResultMerger {
    label: String,
    scratch: Mutex<Scratch>,
}

impl ResultMerger {
    pub fn in_memory(label: &str) -> Self {
        Self {
            label: label.to_string(),
            scratch: Mutex::new(Scratch::Memory(Vec::new())),
        }
    }

    /// Spill provisional records to `path`; the file is removed by
    /// [`ResultMerger::finalize`].
    pub fn with_scratch_file(label: &str, path: &Path) -> Result<Self> {
        let writer = BufWriter::new(File::create(path)?);
        Ok(Self {
            label: label.to_string(),
            scratch: Mutex::new(Scratch::File { path: path.to_path_buf(), writer }),
        })
    }

    /// Append one bundle's transcripts; gene ids are `first_gene + t.gene`.
    ///
    /// Records are formatted before the scratch lock is taken, so concurrent
    /// workers only serialize on the write itself.
    pub fn append(
        &self,
        chrom: &str,
        first_gene: GeneId,
        transcripts: &[InferredTranscript],
    ) -> Result<()> {
        let mut block = String::new();
        let mut per_gene: Vec<usize> = Vec::new();
        for t in transcripts {
            if per_gene.len() <= t.gene {
                per_gene.resize(t.gene + 1, 0);
            }
            per_gene[t.gene] += 1;
            let gene_id = first_gene + t.gene as GeneId;
            let lines = format_transcript(&self.label, chrom, gene_id, per_gene[t.gene], t);
            let guide_id = t.guide.as_ref().map(|g| g.id).unwrap_or(0);
            let _ = writeln!(
                block,
                "{} {} {} {} {}",
                lines.len(),
                t.length(),
                guide_id,
                t.abundance,
                t.coverage
            );
            for line in lines {
                block.push_str(&line);
                block.push('\n');
            }
        }

        let mut scratch = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
        scratch.writer().write_all(block.as_bytes())?;
        Ok(())
    }

    /// Rewrite every provisional record to `out` with its final abundance,
    /// in the order records were appended.
    ///
    /// Guide-backed records also update `guide_cov` when given.
    pub fn finalize<W: Write>(
        self,
        total_frag_len: u64,
        out: &mut W,
        guide_cov: Option<&mut GuideCoverage>,
    ) -> Result<MergeReport> {
        let scratch = self.scratch.into_inner().unwrap_or_else(PoisonError::into_inner);
        let report = match scratch {
            Scratch::Memory(buf) => rewrite(Cursor::new(buf), total_frag_len, out, guide_cov)?,
            Scratch::File { path, writer } => {
                writer.into_inner().map_err(|e| e.into_error())?;
                let reader = BufReader::new(File::open(&path)?);
                let report = rewrite(reader, total_frag_len, out, guide_cov)?;
                fs::remove_file(&path)?;
                report
            }
        };
        Ok(report)
    }
}

fn rewrite<R: BufRead, W: Write>(
    reader: R,
    total_frag_len: u64,
    out: &mut W,
    mut guide_cov: Option<&mut GuideCoverage>,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    let mut lines = reader.lines().enumerate();

    while let Some((idx, header)) = lines.next() {
        let header = header?;
        if header.trim().is_empty() {
            continue;
        }
        let rec = ProvisionalHeader::parse(&header)
            .map_err(|reason| AssemblyError::MalformedScratch { line: idx + 1, reason })?;
        let fpkm = normalized_abundance(rec.coverage, total_frag_len);

        if rec.guide_id > 0 {
            report.guided += 1;
            if let Some(cov) = guide_cov.as_deref_mut() {
                cov.record(rec.guide_id, rec.coverage, fpkm);
            }
        }

        for i in 0..rec.line_count {
            let line = match lines.next() {
                Some((_, line)) => line?,
                None => {
                    return Err(AssemblyError::MalformedScratch {
                        line: idx + 1,
                        reason: format!("record announces {} lines, found {i}", rec.line_count),
                    })
                }
            };
            if i == 0 {
                writeln!(out, "{line} FPKM \"{fpkm:.6}\";")?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        report.transcripts += 1;
    }

    out.flush()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provisional_header() {
        let rec = ProvisionalHeader::parse("3 1200 7 0.5 12.25").unwrap();
        assert_eq!(rec.line_count, 3);
        assert_eq!(rec.length, 1200);
        assert_eq!(rec.guide_id, 7);
        assert!((rec.coverage - 12.25).abs() < 1e-12);
    }

    #[test]
    fn rejects_short_header() {
        let err = ProvisionalHeader::parse("3 1200 7").unwrap_err();
        assert!(err.contains("expected 5 fields"));
    }

    #[test]
    fn truncated_record_is_malformed() {
        let scratch = "2 100 0 1 1\nchr1\tSTRG\ttranscript\n";
        let mut out = Vec::new();
        let err = rewrite(Cursor::new(scratch), 1000, &mut out, None).unwrap_err();
        assert!(matches!(err, AssemblyError::MalformedScratch { line: 1, .. }));
    }
}
