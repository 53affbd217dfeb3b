use crate::cli::Args;
use anyhow::{bail, Result};

pub const DEFAULT_BUNDLE_GAP: u32 = 50;
pub const DEFAULT_MAX_READ_COV: u32 = 1_000_000;
/// Smallest accepted saturation depth.
pub const MIN_MAX_READ_COV: u32 = 2;

/// Validated engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    /// Worker threads; at least 1.
    pub workers: usize,
    pub bundle_gap: u32,
    pub max_read_cov: u32,
    /// Approximate inference for every bundle, not only saturated ones.
    pub fast: bool,
    /// Prefix of gene and transcript ids.
    pub label: String,
    pub min_coverage: f64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            bundle_gap: DEFAULT_BUNDLE_GAP,
            max_read_cov: DEFAULT_MAX_READ_COV,
            fast: true,
            label: "STRG".to_string(),
            min_coverage: 2.5,
        }
    }
}

impl AssemblyConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.guide_coverage.is_some() && args.guide_gff.is_none() {
            bail!("--guide-coverage requires a reference annotation (-G/--guide)");
        }
        if args.label.is_empty() || args.label.contains(char::is_whitespace) {
            bail!("--label must be a non-empty word, got '{}'", args.label);
        }

        let mut config = Self {
            fast: !args.no_fast,
            label: args.label.clone(),
            bundle_gap: args.bundle_gap,
            ..Self::default()
        };
        config = config.with_workers(args.threads).with_max_read_cov(args.max_read_cov);
        config.min_coverage = if args.min_cov.is_finite() && args.min_cov >= 0.0 {
            args.min_cov
        } else {
            tracing::warn!(min_cov = args.min_cov, "invalid --min-cov ignored");
            config.min_coverage
        };
        Ok(config)
    }

    /// Set the worker count, clamping 0 to 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers == 0 {
            tracing::warn!("--threads 0 clamped to 1");
        }
        self.workers = workers.max(1);
        self
    }

    /// Set the saturation depth; values below 2 keep the current one.
    pub fn with_max_read_cov(mut self, max_read_cov: u32) -> Self {
        if max_read_cov < MIN_MAX_READ_COV {
            tracing::warn!(
                max_read_cov,
                kept = self.max_read_cov,
                "--max-read-cov below {MIN_MAX_READ_COV} ignored"
            );
        } else {
            self.max_read_cov = max_read_cov;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["locus-rs", "in.bam"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn cli_defaults_match_library_defaults() {
        let config = AssemblyConfig::from_args(&args(&[])).unwrap();
        assert_eq!(config, AssemblyConfig::default());
    }

    #[test]
    fn guide_coverage_requires_guides() {
        let err = AssemblyConfig::from_args(&args(&["-B", "cov.tsv"])).unwrap_err();
        assert!(err.to_string().contains("--guide"), "unexpected error: {err}");
        assert!(AssemblyConfig::from_args(&args(&["-B", "cov.tsv", "-G", "g.gtf"])).is_ok());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = AssemblyConfig::from_args(&args(&["-p", "0", "-s", "1", "-x"])).unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_read_cov, DEFAULT_MAX_READ_COV);
        assert!(!config.fast);

        let config = AssemblyConfig::from_args(&args(&["-s", "2"])).unwrap();
        assert_eq!(config.max_read_cov, 2);
    }
}
