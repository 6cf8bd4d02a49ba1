//! # gpumeter-cpu
//!
//! Deterministic software implementation of the gpumeter backend traits.
//!
//! [`SoftDevice`] models the GPU timeline entirely in host memory: recorded
//! commands accumulate in an open batch, submission tags them with an epoch,
//! and completion is stepped explicitly (or all at once through
//! [`wait_idle`](SubmissionTimeline::wait_idle)). Slot-end commands sample a
//! programmable counter source, and resolves copy slot values into readback
//! regions only when their epoch completes — so readiness gates can be
//! exercised against genuinely unfinished work, without hardware.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gpumeter_core::{DeferredQuery, Query, QueryDesc, QueryKind, SubmissionTimeline};
//! use gpumeter_cpu::SoftDevice;
//!
//! let device = Arc::new(SoftDevice::new());
//! let mut query = Query::new(device.clone(), QueryDesc::new(QueryKind::Occlusion))?;
//!
//! device.set_counter(42);
//! query.end();
//!
//! let mut result = [0u8; 8];
//! assert!(!query.get_data(Some(&mut result), true, false)?); // not submitted yet
//!
//! device.wait_idle()?;
//! assert!(query.get_data(Some(&mut result), false, false)?);
//! assert_eq!(u64::from_ne_bytes(result), 42);
//! # Ok::<(), gpumeter_core::QueryError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::ops::Range;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use gpumeter_core::{
    Epoch, QueryBackend, QueryError, ReadbackHeap, ReadbackRegion, Result, SlotArray, SlotKind,
    SubmissionTimeline,
};

/// A command recorded into the open batch, executed at completion time.
enum Command {
    Resolve {
        slots: u64,
        index: u32,
        dst: u64,
        dst_offset: u64,
    },
}

struct SlotData {
    kind: SlotKind,
    values: Vec<u64>,
}

struct RegionData {
    // u64 storage keeps mapped pointers 8-aligned; the boxed slice never
    // moves while a mapping is outstanding.
    words: Box<[u64]>,
    size: u64,
    mapped: bool,
}

#[derive(Default)]
struct Inner {
    counters: Vec<u64>,
    slot_arrays: HashMap<u64, SlotData>,
    regions: HashMap<u64, RegionData>,
    pending: Vec<Command>,
    in_flight: Vec<(Epoch, Command)>,
    released_regions: Vec<(u64, Epoch)>,
    released_slot_arrays: Vec<u64>,
    has_commands: bool,
}

/// Deterministic software implementation of [`QueryBackend`].
pub struct SoftDevice {
    current: AtomicU64,
    completed: AtomicU64,
    next_id: AtomicU64,
    fail_submit: AtomicBool,
    inner: Mutex<Inner>,
}

impl SoftDevice {
    /// Create a device with an empty open batch at epoch 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(1),
            completed: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            fail_submit: AtomicBool::new(false),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Set the counter source sampled by subsequent slot-end commands.
    ///
    /// Multi-counter kinds sample one value per counter; missing values
    /// read as zero.
    pub fn set_counters(&self, values: &[u64]) {
        self.inner.lock().counters = values.to_vec();
    }

    /// Single-counter convenience for [`set_counters`](Self::set_counters).
    pub fn set_counter(&self, value: u64) {
        self.set_counters(&[value]);
    }

    /// Make the next submission fail, exercising non-failing readiness
    /// gates that must downgrade the error to "not ready".
    pub fn fail_next_submit(&self) {
        self.fail_submit.store(true, Ordering::SeqCst);
    }

    /// Execute in-flight work through `epoch` and mark it complete.
    ///
    /// Epochs that have not been submitted yet are unaffected; completed
    /// never overtakes the last submitted epoch.
    pub fn complete_through(&self, epoch: Epoch) {
        let last_submitted = self.current.load(Ordering::SeqCst) - 1;
        let target = epoch.value().min(last_submitted);

        let mut inner = self.inner.lock();
        let in_flight = std::mem::take(&mut inner.in_flight);
        let (done, rest): (Vec<_>, Vec<_>) = in_flight
            .into_iter()
            .partition(|(e, _)| e.value() <= target);
        inner.in_flight = rest;

        for (_, command) in done {
            match command {
                Command::Resolve {
                    slots,
                    index,
                    dst,
                    dst_offset,
                } => {
                    let sample = inner.slot_arrays.get(&slots).map(|slot| {
                        let n = slot.kind.counters();
                        let base = index as usize * n;
                        slot.values[base..base + n].to_vec()
                    });
                    if let (Some(sample), Some(region)) = (sample, inner.regions.get_mut(&dst)) {
                        let base = (dst_offset / 8) as usize;
                        region.words[base..base + sample.len()].copy_from_slice(&sample);
                    }
                }
            }
        }

        self.completed.fetch_max(target, Ordering::SeqCst);
        tracing::trace!(completed = target, "completed batches");
    }

    /// Execute and complete everything submitted so far.
    pub fn complete_all(&self) {
        let last_submitted = self.current.load(Ordering::SeqCst) - 1;
        self.complete_through(Epoch::new(last_submitted));
    }

    /// Regions released so far, with the epoch their reuse defers on.
    #[must_use]
    pub fn released_regions(&self) -> Vec<(u64, Epoch)> {
        self.inner.lock().released_regions.clone()
    }

    /// Slot arrays released so far.
    #[must_use]
    pub fn released_slot_arrays(&self) -> Vec<u64> {
        self.inner.lock().released_slot_arrays.clone()
    }
}

impl Default for SoftDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionTimeline for SoftDevice {
    fn current_epoch(&self) -> Epoch {
        Epoch::new(self.current.load(Ordering::SeqCst))
    }

    fn current_epoch_with_commands(&self) -> Epoch {
        let has_commands = self.inner.lock().has_commands;
        let current = self.current.load(Ordering::SeqCst);
        if has_commands {
            Epoch::new(current)
        } else {
            Epoch::new(current - 1)
        }
    }

    fn completed_epoch(&self) -> Epoch {
        Epoch::new(self.completed.load(Ordering::SeqCst))
    }

    fn submit_pending(&self) -> Result<()> {
        if self.fail_submit.swap(false, Ordering::SeqCst) {
            return Err(QueryError::SubmitFailed(
                "injected submit failure".to_string(),
            ));
        }

        let mut inner = self.inner.lock();
        let epoch = Epoch::new(self.current.load(Ordering::SeqCst));
        let drained: Vec<Command> = inner.pending.drain(..).collect();
        for command in drained {
            inner.in_flight.push((epoch, command));
        }
        inner.has_commands = false;
        self.current.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(epoch = epoch.value(), "submitted batch");
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let needs_submit = {
            let inner = self.inner.lock();
            inner.has_commands || !inner.pending.is_empty()
        };
        if needs_submit {
            self.submit_pending()?;
        }
        self.complete_all();
        Ok(())
    }

    fn commands_recorded(&self) {
        self.inner.lock().has_commands = true;
    }
}

impl ReadbackHeap for SoftDevice {
    fn allocate(&self, size: u64) -> Result<ReadbackRegion> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let words = vec![0u64; size.div_ceil(8) as usize].into_boxed_slice();
        self.inner.lock().regions.insert(
            id,
            RegionData {
                words,
                size,
                mapped: false,
            },
        );
        Ok(ReadbackRegion::new(id, size))
    }

    fn release(&self, region: ReadbackRegion, last_used: Epoch) {
        let mut inner = self.inner.lock();
        inner.regions.remove(&region.id());
        inner.released_regions.push((region.id(), last_used));
    }

    fn map(&self, region: &ReadbackRegion, read: Range<u64>) -> Result<NonNull<u8>> {
        let mut inner = self.inner.lock();
        let data = inner
            .regions
            .get_mut(&region.id())
            .ok_or_else(|| QueryError::MapFailed(format!("unknown region {}", region.id())))?;
        assert!(read.end <= data.size, "read range exceeds region");
        assert!(!data.mapped, "region already mapped");
        data.mapped = true;
        NonNull::new(data.words.as_mut_ptr().cast::<u8>())
            .ok_or_else(|| QueryError::MapFailed("null mapping".to_string()))
    }

    fn unmap(&self, region: &ReadbackRegion, written: Range<u64>) {
        let mut inner = self.inner.lock();
        if let Some(data) = inner.regions.get_mut(&region.id()) {
            assert!(data.mapped, "unmap without map");
            data.mapped = false;
        }
        // Host memory: CPU writes are already visible, the range is only
        // bookkeeping here.
        let _ = written;
    }
}

impl QueryBackend for SoftDevice {
    fn create_slot_array(&self, kind: SlotKind, capacity: u32) -> Result<SlotArray> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let values = vec![0u64; capacity as usize * kind.counters()];
        self.inner
            .lock()
            .slot_arrays
            .insert(id, SlotData { kind, values });
        Ok(SlotArray::new(id, kind, capacity))
    }

    fn release_slot_array(&self, slots: SlotArray) {
        let mut inner = self.inner.lock();
        inner.slot_arrays.remove(&slots.id());
        inner.released_slot_arrays.push(slots.id());
    }

    fn record_slot_end(&self, slots: &SlotArray, index: u32) {
        let mut inner = self.inner.lock();
        let sample = inner.counters.clone();
        let slot = inner
            .slot_arrays
            .get_mut(&slots.id())
            .expect("slot array exists until released");
        let n = slot.kind.counters();
        let base = index as usize * n;
        for counter in 0..n {
            slot.values[base + counter] = sample.get(counter).copied().unwrap_or(0);
        }
        inner.has_commands = true;
    }

    fn record_slot_resolve(
        &self,
        slots: &SlotArray,
        index: u32,
        dst: &ReadbackRegion,
        dst_offset: u64,
    ) {
        let mut inner = self.inner.lock();
        inner.pending.push(Command::Resolve {
            slots: slots.id(),
            index,
            dst: dst.id(),
            dst_offset,
        });
        inner.has_commands = true;
    }
}
