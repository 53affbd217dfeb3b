//! locus-rs: partition sorted alignments into loci and assemble them in parallel.
//!
//! # Library usage
//!
//! ```no_run
//! use locus_rs::{assemble, AlignmentRecord, AssemblyConfig, CoverageInference, GuideIndex, ResultMerger};
//!
//! let config = AssemblyConfig::default().with_workers(4);
//! let records = vec![
//!     Ok(AlignmentRecord::unspliced("r1", "chr1", 100, 199)),
//!     Ok(AlignmentRecord::unspliced("r2", "chr1", 120, 219)),
//! ];
//! let guides = GuideIndex::new();
//! let inference = CoverageInference::default();
//! let mut out = Vec::new();
//! let summary = assemble(
//!     &config,
//!     records,
//!     &guides,
//!     &inference,
//!     ResultMerger::in_memory(&config.label),
//!     &mut out,
//!     None,
//! )?;
//! println!("{} bundles", summary.bundler.bundles);
//! # Ok::<(), anyhow::Error>(())
//! ```

// Internal modules, not part of the public API.
pub(crate) mod types;
pub(crate) mod worker;

// Public modules.
pub mod alignment;
pub mod annotation;
pub mod bam_input;
pub mod bundle;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod counters;
pub mod coverage;
pub mod dispatch;
pub mod error;
pub mod guides;
pub mod inference;
pub mod merger;
pub mod pipeline;
pub mod pool;

// Flat re-exports for the most commonly used public types.
pub use alignment::{AlignmentRecord, Segment};
pub use bundle::{Bundle, BundleStatus, Junction};
pub use bundler::{Bundler, BundlerStats};
pub use config::AssemblyConfig;
pub use counters::{CounterSnapshot, GlobalCounters};
pub use coverage::GuideCoverage;
pub use dispatch::{Dispatcher, QueueReport, WorkQueue};
pub use error::AssemblyError;
pub use guides::{GuideCursor, GuideIndex, GuideTranscript};
pub use inference::{CoverageInference, InferredTranscript, TranscriptInference};
pub use merger::{format_transcript, normalized_abundance, MergeReport, ResultMerger};
pub use pipeline::{assemble, RunSummary};
pub use pool::{BufferPool, PoolOccupancy};
pub use worker::WorkerStats;
