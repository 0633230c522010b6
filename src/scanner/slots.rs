//! Slot scheduler bounding how many ports are probed at once.
//!
//! A counting semaphore holds one permit per slot, so a caller waiting for
//! capacity is parked by tokio rather than polling. The slot table beside it
//! records which port each busy slot is serving. Every busy slot holds a
//! permit, so once a permit is granted a free slot is guaranteed to exist.
//! Free slots are handed out lowest index first.

use crate::error::{ScanError, ScanResult};
use crate::types::Port;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// State of one scheduling unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Busy(Port),
}

/// Bounded pool of worker slots.
#[derive(Debug)]
pub struct SlotScheduler {
    permits: Arc<Semaphore>,
    table: Mutex<Vec<SlotState>>,
    peak: AtomicUsize,
}

impl SlotScheduler {
    /// Create a scheduler with `capacity` slots.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(capacity)),
            table: Mutex::new(vec![SlotState::Free; capacity]),
            peak: AtomicUsize::new(0),
        })
    }

    /// Wait for a free slot and bind it to `port`.
    ///
    /// Suspends the calling task while every slot is busy.
    pub async fn acquire(self: &Arc<Self>, port: Port) -> ScanResult<SlotHandle> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ScanError::SchedulerClosed(port.as_u16()))?;

        let mut table = self.lock_table();
        let index = table
            .iter()
            .position(|slot| *slot == SlotState::Free)
            .ok_or(ScanError::SlotTableExhausted(port.as_u16()))?;
        table[index] = SlotState::Busy(port);
        let busy = count_busy(&table);
        drop(table);

        self.peak.fetch_max(busy, Ordering::Relaxed);
        trace!(slot = index, %port, busy, "slot granted");

        Ok(SlotHandle {
            scheduler: Arc::clone(self),
            index,
            port,
            _permit: permit,
        })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.lock_table().len()
    }

    /// Slots currently bound to a port.
    pub fn busy(&self) -> usize {
        count_busy(&self.lock_table())
    }

    /// Highest number of simultaneously busy slots seen so far.
    pub fn peak_busy(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Copy of the slot table.
    pub fn snapshot(&self) -> Vec<SlotState> {
        self.lock_table().clone()
    }

    fn lock_table(&self) -> MutexGuard<'_, Vec<SlotState>> {
        // The table holds plain values, so a poisoned lock is still consistent.
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn count_busy(table: &[SlotState]) -> usize {
    table
        .iter()
        .filter(|slot| matches!(slot, SlotState::Busy(_)))
        .count()
}

/// A granted slot. Releasing or dropping it frees the slot.
#[derive(Debug)]
pub struct SlotHandle {
    scheduler: Arc<SlotScheduler>,
    index: usize,
    port: Port,
    _permit: OwnedSemaphorePermit,
}

impl SlotHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn port(&self) -> Port {
        self.port
    }

    /// Return the slot to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SlotHandle {
    fn drop(&mut self) {
        // The table entry is freed before the permit field is dropped.
        let mut table = self.scheduler.lock_table();
        table[self.index] = SlotState::Free;
        trace!(slot = self.index, port = %self.port, "slot released");
    }
}
