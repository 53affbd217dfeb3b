use crate::types::GeneId;
use std::sync::{Mutex, PoisonError};

/// Values of the run-wide counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub num_fragments: u64,
    pub frag_len: u64,
    /// Last gene id handed out; 0 before the first gene.
    pub genes: GeneId,
}

impl CounterSnapshot {
    pub fn average_frag_len(&self) -> f64 {
        if self.num_fragments == 0 {
            0.0
        } else {
            self.frag_len as f64 / self.num_fragments as f64
        }
    }
}

/// Fragment totals and the gene numbering counter, behind one lock.
///
/// Totals are only final after every worker has been joined.
#[derive(Debug, Default)]
pub struct GlobalCounters {
    inner: Mutex<CounterSnapshot>,
}

impl GlobalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bundle(&self, num_fragments: u64, frag_len: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.num_fragments += num_fragments;
        inner.frag_len += frag_len;
    }

    /// Reserve `count` consecutive gene ids and return the first one.
    ///
    /// Ids start at 1 and follow the order in which bundles finish.
    pub fn assign_gene_ids(&self, count: usize) -> GeneId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let first = inner.genes + 1;
        inner.genes += count as GeneId;
        first
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
