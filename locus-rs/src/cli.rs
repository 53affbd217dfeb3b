use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "locus-rs",
    about = "Bundle sorted RNA-seq alignments into loci and assemble transcripts in parallel",
    version
)]
pub struct Args {
    /// Input BAM with coordinate-sorted genomic alignments
    pub in_bam: PathBuf,

    /// Reference annotation to guide assembly (GTF/GFF)
    #[arg(short = 'G', long = "guide", value_name = "GTF/GFF")]
    pub guide_gff: Option<PathBuf>,

    /// Output GTF path (stdout when omitted)
    #[arg(short = 'o', long = "out", value_name = "GTF")]
    pub out_gtf: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Minimum gap between reads that starts a new bundle
    #[arg(short = 'g', long = "bundle-gap", default_value_t = 50)]
    pub bundle_gap: u32,

    /// Per-base read depth at which a bundle is considered saturated
    #[arg(short = 's', long = "max-read-cov", default_value_t = 1_000_000)]
    pub max_read_cov: u32,

    /// Disable fast mode for bundles below the saturation depth
    #[arg(short = 'x', long = "no-fast")]
    pub no_fast: bool,

    /// Minimum transcript coverage reported outside fast mode
    #[arg(short = 'c', long = "min-cov", default_value_t = 2.5)]
    pub min_cov: f64,

    /// Prefix for gene and transcript ids
    #[arg(short = 'l', long = "label", default_value = "STRG")]
    pub label: String,

    /// Write per-guide coverage and abundance to this TSV (requires -G)
    #[arg(short = 'B', long = "guide-coverage", value_name = "TSV")]
    pub guide_coverage: Option<PathBuf>,

    /// Keep provisional records in memory instead of `<out>.tmp`
    #[arg(long)]
    pub in_memory_scratch: bool,

    /// Set logging level to WARN
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
