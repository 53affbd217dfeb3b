//! Ready queue between the producer and the workers.
//!
//! A bounded crossfire channel of capacity `W+1` carries slot indices. Since
//! only `W+1` slots exist, a full queue means every buffer is waiting for a
//! worker; `send` then blocks the producer, and closing the sender is the
//! "no more work" signal every blocked worker wakes up on.

use crate::error::{AssemblyError, Result};
use crate::types::SlotIdx;
use crossfire::{mpmc, MRx, MTx};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct QueueStats {
    queued: AtomicUsize,
    high_water: AtomicUsize,
    dispatched: AtomicUsize,
}

/// Producer end. Dropping it (or calling [`Dispatcher::close`]) ends the run
/// for the workers once the queue is drained.
pub struct Dispatcher {
    tx: MTx<SlotIdx>,
    stats: Arc<QueueStats>,
}

/// Worker end; clone one per worker.
#[derive(Clone)]
pub struct WorkQueue {
    rx: MRx<SlotIdx>,
    stats: Arc<QueueStats>,
}

/// Ready queue sized for `workers` workers.
pub fn channel(workers: usize) -> (Dispatcher, WorkQueue) {
    let capacity = workers.max(1) + 1;
    let (tx, rx) = mpmc::bounded_blocking::<SlotIdx>(capacity);
    let stats = Arc::new(QueueStats::default());
    (
        Dispatcher { tx, stats: Arc::clone(&stats) },
        WorkQueue { rx, stats },
    )
}

impl Dispatcher {
    /// Queue a Ready slot, blocking while the queue is full.
    pub fn submit(&self, slot: SlotIdx) -> Result<()> {
        let depth = self.stats.queued.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.high_water.fetch_max(depth, Ordering::SeqCst);
        if self.tx.send(slot).is_err() {
            self.stats.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(AssemblyError::Disconnected { slot });
        }
        self.stats.dispatched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Largest number of bundles that were queued at once.
    pub fn high_water(&self) -> usize {
        self.stats.high_water.load(Ordering::SeqCst)
    }

    pub fn close(self) -> QueueReport {
        QueueReport {
            dispatched: self.stats.dispatched.load(Ordering::SeqCst),
            high_water: self.high_water(),
        }
    }
}

impl WorkQueue {
    /// Block for the next Ready slot; `None` once the producer has closed the
    /// queue and it is empty.
    pub fn recv(&self) -> Option<SlotIdx> {
        let slot = self.rx.recv().ok()?;
        self.stats.queued.fetch_sub(1, Ordering::SeqCst);
        Some(slot)
    }
}

/// Queue totals returned when the producer closes the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub dispatched: usize,
    pub high_water: usize,
}
