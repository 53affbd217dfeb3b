//! Fatal conditions raised by the bundling engine.

use crate::bundle::BundleStatus;
use crate::types::SlotIdx;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AssemblyError>;

/// Every variant aborts the run; there is no per-bundle recovery.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// A record starts before its predecessor on the same chromosome.
    #[error("input alignments are not sorted: {chrom}:{pos} follows {chrom}:{prev_pos}")]
    UnsortedInput {
        /// Chromosome of the offending record
        chrom: String,
        /// Start of the offending record
        pos: u32,
        /// Start of the record read just before it
        prev_pos: u32,
    },

    /// Records for a chromosome reappear after another chromosome was started.
    #[error("input alignments are not sorted: chromosome '{chrom}' reappears at position {pos}")]
    ChromosomeRevisited {
        /// The chromosome seen twice
        chrom: String,
        /// Start of the first record of the second run
        pos: u32,
    },

    /// A buffer slot was asked to make a transition its state does not allow.
    #[error("buffer pool invariant violated: slot {slot} is {found:?}, expected {expected:?}")]
    PoolInvariant {
        /// Slot index
        slot: SlotIdx,
        /// State the transition requires
        expected: BundleStatus,
        /// State the slot is actually in
        found: BundleStatus,
    },

    /// A slot index outside the arena, or one that was never taken off the free list.
    #[error("buffer pool invariant violated: slot {slot} {reason}")]
    SlotMisuse {
        /// Slot index
        slot: SlotIdx,
        /// What was wrong with it
        reason: &'static str,
    },

    /// The pool was shut down after a worker failure.
    #[error("buffer pool aborted after a worker failure")]
    PoolAborted,

    /// The dispatcher has no live workers left to receive a bundle.
    #[error("no worker left to receive bundle in slot {slot}")]
    Disconnected {
        /// Slot that could not be queued
        slot: SlotIdx,
    },

    /// The transcript inference collaborator failed on a bundle.
    #[error("transcript inference failed on bundle {chrom}:{start}-{end}: {reason}")]
    Inference {
        /// Bundle chromosome
        chrom: String,
        /// Bundle start
        start: u32,
        /// Bundle end
        end: u32,
        /// Collaborator message
        reason: String,
    },

    /// A provisional record header could not be parsed during the final pass.
    #[error("malformed scratch record at line {line}: {reason}")]
    MalformedScratch {
        /// 1-based line number in the scratch store
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
