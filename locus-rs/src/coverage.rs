use crate::guides::{GuideIndex, GuideTranscript};
use crate::types::GuideId;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct GuideCoverageRow {
    pub guide: Arc<GuideTranscript>,
    pub cov: f64,
    pub fpkm: f64,
}

/// Final coverage and abundance per reference transcript, indexed by guide id.
///
/// Guides never assembled keep zeros.
#[derive(Debug, Clone, Default)]
pub struct GuideCoverage {
    rows: Vec<GuideCoverageRow>,
}

impl GuideCoverage {
    pub fn new(index: &GuideIndex) -> Self {
        let rows = index
            .iter()
            .map(|guide| GuideCoverageRow { guide: Arc::clone(guide), cov: 0.0, fpkm: 0.0 })
            .collect();
        Self { rows }
    }

    /// Store final values for a guide; returns false for an unknown id.
    pub fn record(&mut self, id: GuideId, cov: f64, fpkm: f64) -> bool {
        let Some(row) = (id as usize).checked_sub(1).and_then(|i| self.rows.get_mut(i)) else {
            return false;
        };
        row.cov = cov;
        row.fpkm = fpkm;
        true
    }

    pub fn get(&self, id: GuideId) -> Option<&GuideCoverageRow> {
        (id as usize).checked_sub(1).and_then(|i| self.rows.get(i))
    }

    pub fn write_tsv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "t_id\tchr\tstrand\tstart\tend\tt_name\tnum_exons\tlength\tcov\tFPKM")?;
        for row in &self.rows {
            let g = &row.guide;
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{:.6}",
                g.id,
                g.chrom,
                g.strand,
                g.start,
                g.end,
                g.name,
                g.exons.len(),
                g.length(),
                row.cov,
                row.fpkm,
            )?;
        }
        Ok(())
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create guide coverage file {}", path.display()))?;
        let mut out = BufWriter::new(file);
        self.write_tsv(&mut out)?;
        out.flush()?;
        Ok(())
    }
}
