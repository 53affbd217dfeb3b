//! Fixed arena of reusable bundle buffers.
//!
//! The pool holds `W+1` bundles for `W` workers: while every worker is busy
//! the producer can still be filling one more locus. Ownership moves as a
//! slot index (free list → producer → dispatcher queue → worker → free list);
//! nobody holds a pointer into the arena.

use crate::bundle::{Bundle, BundleStatus};
use crate::error::{AssemblyError, Result};
use crate::types::SlotIdx;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct PoolState {
    status: Vec<BundleStatus>,
    free: Vec<SlotIdx>,
    aborted: bool,
}

/// Slot counts by state, taken under the pool lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolOccupancy {
    pub free: usize,
    pub loading: usize,
    pub ready: usize,
    pub processing: usize,
    /// Slots currently sitting in the free list.
    pub free_listed: usize,
}

impl PoolOccupancy {
    pub fn total(&self) -> usize {
        self.free + self.loading + self.ready + self.processing
    }
}

pub struct BufferPool {
    slots: Vec<Mutex<Bundle>>,
    state: Mutex<PoolState>,
    freed: Condvar,
}

impl BufferPool {
    /// Pool sized for `workers` workers, i.e. `workers + 1` slots.
    pub fn new(workers: usize) -> Self {
        let capacity = workers.max(1) + 1;
        let slots = (0..capacity).map(|i| Mutex::new(Bundle::new(i))).collect();
        Self {
            slots,
            state: Mutex::new(PoolState {
                status: vec![BundleStatus::Free; capacity],
                // Reversed so that slot 0 is handed out first.
                free: (0..capacity).rev().collect(),
                aborted: false,
            }),
            freed: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Take a slot off the free list, blocking until one is released.
    ///
    /// The slot stays `Free` until [`BufferPool::mark_loading`]; it is no
    /// longer in the free list, so no other caller can receive it.
    pub fn acquire_free(&self) -> Result<SlotIdx> {
        let mut state = self.lock_state();
        loop {
            if state.aborted {
                return Err(AssemblyError::PoolAborted);
            }
            if let Some(slot) = state.free.pop() {
                return Ok(slot);
            }
            state = self.freed.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn mark_loading(&self, slot: SlotIdx) -> Result<()> {
        let mut state = self.lock_state();
        if state.free.contains(&slot) {
            return Err(AssemblyError::SlotMisuse { slot, reason: "is still on the free list" });
        }
        Self::transition(&mut state, slot, BundleStatus::Free, BundleStatus::Loading)
    }

    pub fn mark_ready(&self, slot: SlotIdx) -> Result<()> {
        let mut state = self.lock_state();
        Self::transition(&mut state, slot, BundleStatus::Loading, BundleStatus::Ready)
    }

    pub fn mark_processing(&self, slot: SlotIdx) -> Result<()> {
        let mut state = self.lock_state();
        Self::transition(&mut state, slot, BundleStatus::Ready, BundleStatus::Processing)
    }

    /// Clear the bundle and put the slot back on the free list.
    ///
    /// Valid from `Processing` (a worker is done) and from `Loading` (the
    /// producer discards a bundle that never received a read).
    pub fn release(&self, slot: SlotIdx) -> Result<()> {
        let found = Self::status_of(&self.lock_state(), slot)?;
        if !matches!(found, BundleStatus::Processing | BundleStatus::Loading) {
            return Err(AssemblyError::PoolInvariant {
                slot,
                expected: BundleStatus::Processing,
                found,
            });
        }
        self.bundle(slot).clear();

        // Only the slot's owner moves it out of Processing/Loading, so the
        // state checked above still holds.
        let mut state = self.lock_state();
        state.status[slot] = BundleStatus::Free;
        state.free.push(slot);
        drop(state);
        self.freed.notify_one();
        Ok(())
    }

    /// Wake every blocked acquirer with [`AssemblyError::PoolAborted`].
    pub fn abort(&self) {
        self.lock_state().aborted = true;
        self.freed.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock_state().aborted
    }

    /// Exclusive access to a slot's bundle.
    ///
    /// The state machine guarantees a single owner per slot, so this lock is
    /// never contended; it only makes the hand-off between threads sound.
    pub fn bundle(&self, slot: SlotIdx) -> MutexGuard<'_, Bundle> {
        self.slots[slot].lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self, slot: SlotIdx) -> Option<BundleStatus> {
        self.lock_state().status.get(slot).copied()
    }

    pub fn occupancy(&self) -> PoolOccupancy {
        let state = self.lock_state();
        let mut occ = PoolOccupancy { free_listed: state.free.len(), ..PoolOccupancy::default() };
        for status in &state.status {
            match status {
                BundleStatus::Free => occ.free += 1,
                BundleStatus::Loading => occ.loading += 1,
                BundleStatus::Ready => occ.ready += 1,
                BundleStatus::Processing => occ.processing += 1,
            }
        }
        occ
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status_of(state: &PoolState, slot: SlotIdx) -> Result<BundleStatus> {
        state
            .status
            .get(slot)
            .copied()
            .ok_or(AssemblyError::SlotMisuse { slot, reason: "is outside the pool" })
    }

    fn transition(
        state: &mut PoolState,
        slot: SlotIdx,
        expected: BundleStatus,
        next: BundleStatus,
    ) -> Result<()> {
        let found = Self::status_of(state, slot)?;
        if found != expected {
            return Err(AssemblyError::PoolInvariant { slot, expected, found });
        }
        state.status[slot] = next;
        Ok(())
    }
}
