//! Deferred query lifecycle and the rotating-instance query object.
//!
//! A query is issued on the CPU, executed by the GPU at some later point,
//! and read back on the CPU later still. [`DeferredQuery`] carries the
//! lifecycle shared by every deferred operation: finalizing a recording
//! scope, deciding readiness without stalling, and fetching the result.
//! [`Query`] is the concrete measurement object: a fixed-capacity rotating
//! set of GPU-recorded instances that always reduces to a single logical
//! value, no matter how many instances were recorded.

use std::sync::Arc;

use crate::backend::{QueryBackend, SlotArray};
use crate::epoch::Epoch;
use crate::error::{QueryError, Result};
use crate::kind::{QueryKind, Reduction, MAX_QUERY_COUNTERS};
use crate::readback::{MappedRegion, ReadbackHeap, ReadbackRegion};
use crate::timeline::SubmissionTimeline;

/// One outstanding deferred GPU operation.
///
/// Implementors supply the kind-specific pieces (`end_records`,
/// `read_result`); the provided methods implement the shared
/// end/readiness/fetch logic over them.
pub trait DeferredQuery {
    /// Backend this operation records into.
    fn backend(&self) -> &dyn QueryBackend;

    /// Epoch recorded by the most recent [`end`](Self::end). [`Epoch::ZERO`]
    /// until the operation has been ended.
    fn last_issued(&self) -> Epoch;

    /// Store the epoch of the most recent end.
    fn set_last_issued(&mut self, epoch: Epoch);

    /// Kind-specific end-of-scope recording.
    fn end_records(&mut self);

    /// Kind-specific extraction of the final result into `dest`.
    fn read_result(&self, dest: &mut [u8]) -> Result<()>;

    /// Finalize the operation for its current recording scope.
    ///
    /// Records the kind-specific end commands, then marks the operation
    /// pending completion at the epoch a flush would signal. Never stalls.
    fn end(&mut self) {
        self.end_records();
        let epoch = self.backend().current_epoch_with_commands();
        self.set_last_issued(epoch);
    }

    /// Non-blocking readiness gate.
    ///
    /// If the work has not been submitted yet, either fails fast
    /// (`do_not_flush`) or forces submission; submission failure is
    /// downgraded to not-ready because this method cannot fail by contract.
    /// Forcing submission does not wait for completion: the result is ready
    /// only once the completed epoch has caught up with the issue epoch.
    fn flush_and_prep(&self, do_not_flush: bool) -> bool {
        let backend = self.backend();
        if self.last_issued() == backend.current_epoch() {
            if do_not_flush {
                return false;
            }
            if let Err(err) = backend.submit_pending() {
                tracing::debug!(error = %err, "submit failed; result treated as not ready");
                return false;
            }
        }
        backend.completed_epoch() >= self.last_issued()
    }

    /// Fetch the result if it is available.
    ///
    /// Returns `Ok(false)` without touching `dest` when the result is not
    /// ready. With `do_not_flush`, never triggers submission. With
    /// `assume_complete`, skips the readiness gate entirely; the caller
    /// vouches that the work has finished.
    fn get_data(
        &self,
        dest: Option<&mut [u8]>,
        do_not_flush: bool,
        assume_complete: bool,
    ) -> Result<bool> {
        if !assume_complete && !self.flush_and_prep(do_not_flush) {
            return Ok(false);
        }

        if let Some(dest) = dest {
            if !dest.is_empty() {
                self.read_result(dest)?;
            }
        }

        Ok(true)
    }
}

/// Configuration for a [`Query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryDesc {
    /// Measurement kind.
    pub kind: QueryKind,
    /// Number of rotating instances backing the query.
    ///
    /// Each suspend/advance cycle consumes one instance; exhausting them
    /// forces a blocking fold, so size this to make folds rare on hot paths.
    pub capacity: u32,
}

impl QueryDesc {
    /// Default instance capacity.
    pub const DEFAULT_CAPACITY: u32 = 8;

    /// Describe a query of `kind` with the default capacity.
    #[must_use]
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            capacity: Self::DEFAULT_CAPACITY,
        }
    }

    /// Override the instance capacity. Must be at least 1.
    #[must_use]
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        assert!(capacity >= 1, "a query needs at least one instance");
        self.capacity = capacity;
        self
    }
}

/// A measurement backed by a rotating set of GPU-recorded instances.
///
/// Each recorded instance occupies one slot in a fixed-capacity GPU slot
/// array and one stride-sized window of a CPU-visible readback region. When
/// every slot has been used, [`advance_instance`](Self::advance_instance)
/// waits for the GPU, folds all recorded values into instance 0, and keeps
/// rotating from there, so arbitrarily many suspend/resume cycles still
/// produce one correct running total in bounded storage.
pub struct Query {
    backend: Arc<dyn QueryBackend>,
    kind: QueryKind,
    slots: Option<SlotArray>,
    storage: Option<ReadbackRegion>,
    capacity: u32,
    current_instance: u32,
    last_issued: Epoch,
    last_used: Epoch,
}

impl Query {
    /// Allocate the slot array and readback storage described by `desc`.
    ///
    /// On failure nothing usable escapes: the error propagates and any
    /// partially acquired resources are returned to the backend.
    pub fn new(backend: Arc<dyn QueryBackend>, desc: QueryDesc) -> Result<Self> {
        assert!(desc.capacity >= 1, "a query needs at least one instance");

        let stride = desc.kind.data_size() as u64;
        let bytes = stride * u64::from(desc.capacity);

        let slots = backend.create_slot_array(desc.kind.slot_kind(), desc.capacity)?;
        let storage = match backend.allocate(bytes) {
            Ok(region) => region,
            Err(err) => {
                backend.release_slot_array(slots);
                return Err(err);
            }
        };

        tracing::debug!(
            kind = ?desc.kind,
            capacity = desc.capacity,
            bytes,
            "created query"
        );

        Ok(Self {
            backend,
            kind: desc.kind,
            slots: Some(slots),
            storage: Some(storage),
            capacity: desc.capacity,
            current_instance: 0,
            last_issued: Epoch::ZERO,
            last_used: Epoch::ZERO,
        })
    }

    /// Measurement kind.
    #[must_use]
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Number of rotating instances.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn slot_array(&self) -> &SlotArray {
        self.slots.as_ref().expect("slot array lives until drop")
    }

    fn storage_region(&self) -> &ReadbackRegion {
        self.storage.as_ref().expect("storage lives until drop")
    }

    /// Record the current instance: end the measurement in its slot, then
    /// resolve the slot into the readback region at the instance's offset.
    ///
    /// Notifies the backend that commands were recorded and remembers the
    /// epoch for deferred storage release.
    pub fn suspend(&mut self) {
        assert!(
            self.current_instance < self.capacity,
            "instance capacity exceeded; advance_instance() reclaims slots"
        );

        let stride = self.kind.data_size() as u64;
        let index = self.current_instance;
        let offset = u64::from(index) * stride;

        let slots = self.slot_array();
        let storage = self.storage_region();
        self.backend.record_slot_end(slots, index);
        self.backend.record_slot_resolve(slots, index, storage, offset);
        self.backend.commands_recorded();

        self.last_used = self.backend.current_epoch();
    }

    /// Move to a new recording scope while reusing this query.
    ///
    /// While unused instances remain this is a plain increment. On capacity
    /// exhaustion it blocks until the GPU is idle, folds every recorded
    /// instance into instance 0, and resumes rotation from instance 1 —
    /// instance 0 then carries the accumulated baseline, and the next
    /// recording contributes to it rather than starting over.
    pub fn advance_instance(&mut self) -> Result<()> {
        assert!(self.current_instance < self.capacity);

        if self.current_instance + 1 < self.capacity {
            self.current_instance += 1;
            return Ok(());
        }

        // Out of instances. The slot array has fixed capacity, so reclaim it
        // by accumulating everything recorded so far into instance 0.
        self.backend.wait_idle()?;

        let stride = self.kind.data_size() as u64;
        let counters = self.kind.counters();
        {
            let heap: &dyn ReadbackHeap = &*self.backend;
            let storage = self.storage_region();
            let mut mapped =
                MappedRegion::map(heap, storage, 0..stride * u64::from(self.capacity))?;
            let words: &mut [u64] = bytemuck::cast_slice_mut(mapped.as_mut_slice());

            for instance in 1..=self.current_instance as usize {
                for counter in 0..counters {
                    let value = words[instance * counters + counter];
                    words[counter] = words[counter].wrapping_add(value);
                }
            }

            mapped.mark_written(0..stride);
        }

        self.current_instance = 1;
        tracing::debug!(kind = ?self.kind, "folded instances into baseline");
        Ok(())
    }

    fn read_accumulated(&self, dest: &mut [u8]) -> Result<()> {
        let required = self.kind.data_size();
        if dest.len() < required {
            return Err(QueryError::DestinationTooSmall {
                required,
                provided: dest.len(),
            });
        }

        let counters = self.kind.counters();
        let stride = self.kind.data_size() as u64;
        let mut scratch = [0u64; MAX_QUERY_COUNTERS];

        // An instance count of zero means the query was never issued; the
        // accumulation stays zero without mapping anything.
        let used = stride * u64::from(self.current_instance);
        if used > 0 {
            let heap: &dyn ReadbackHeap = &*self.backend;
            let storage = self.storage_region();
            let mapped = MappedRegion::map(heap, storage, 0..used)?;
            let words: &[u64] = bytemuck::cast_slice(mapped.as_slice());

            for instance in 0..self.current_instance as usize {
                for counter in 0..counters {
                    scratch[counter] =
                        scratch[counter].wrapping_add(words[instance * counters + counter]);
                }
            }
        }

        match self.kind.reduction() {
            Reduction::Sum => {
                for (counter, chunk) in dest[..required].chunks_exact_mut(8).enumerate() {
                    chunk.copy_from_slice(&scratch[counter].to_ne_bytes());
                }
            }
            Reduction::Max => {
                let mut current = [0u8; 8];
                current.copy_from_slice(&dest[..8]);
                if scratch[0] > u64::from_ne_bytes(current) {
                    dest[..8].copy_from_slice(&scratch[0].to_ne_bytes());
                }
            }
        }

        Ok(())
    }
}

impl DeferredQuery for Query {
    fn backend(&self) -> &dyn QueryBackend {
        self.backend.as_ref()
    }

    fn last_issued(&self) -> Epoch {
        self.last_issued
    }

    fn set_last_issued(&mut self, epoch: Epoch) {
        self.last_issued = epoch;
    }

    fn end_records(&mut self) {
        // A plain end is single-instance: restart at instance 0 and record
        // it. Multi-instance accumulation happens through suspend/advance
        // cycles instead.
        self.current_instance = 0;
        self.suspend();
        self.current_instance = 1;
        debug_assert!(self.current_instance <= self.capacity);
    }

    fn read_result(&self, dest: &mut [u8]) -> Result<()> {
        self.read_accumulated(dest)
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.take() {
            self.backend.release_slot_array(slots);
        }
        if let Some(storage) = self.storage.take() {
            self.backend.release(storage, self.last_used);
        }
    }
}
