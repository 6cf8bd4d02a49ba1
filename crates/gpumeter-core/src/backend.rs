//! Backend services consumed by query objects.
//!
//! A single device object provides every collaborator service a query
//! needs: epoch accounting ([`SubmissionTimeline`]), readback storage
//! ([`ReadbackHeap`]), and the slot-array operations below. Query objects
//! hold the backend behind an `Arc`, which keeps the device alive for as
//! long as any operation it created exists.

use crate::error::Result;
use crate::kind::SlotKind;
use crate::readback::{ReadbackHeap, ReadbackRegion};
use crate::timeline::SubmissionTimeline;

/// Handle to a GPU-visible array of measurement slots.
///
/// Slots are written only by GPU commands; the CPU reads results through a
/// [`ReadbackRegion`] after a resolve.
#[derive(Debug)]
pub struct SlotArray {
    id: u64,
    kind: SlotKind,
    capacity: u32,
}

impl SlotArray {
    /// Construct a handle. Called by backend implementations.
    #[must_use]
    pub fn new(id: u64, kind: SlotKind, capacity: u32) -> Self {
        Self { id, kind, capacity }
    }

    /// Implementation-defined identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Slot flavor.
    #[must_use]
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Device services a [`Query`](crate::Query) records against.
pub trait QueryBackend: SubmissionTimeline + ReadbackHeap {
    /// Create a slot array with `capacity` slots of `kind`.
    fn create_slot_array(&self, kind: SlotKind, capacity: u32) -> Result<SlotArray>;

    /// Release a slot array.
    ///
    /// Deletion is deferred until in-flight GPU work that references the
    /// array has completed; dropping a query with work still pending is safe.
    fn release_slot_array(&self, slots: SlotArray);

    /// Record a command ending the measurement in slot `index`.
    fn record_slot_end(&self, slots: &SlotArray, index: u32);

    /// Record a command resolving slot `index` into `dst` at byte offset
    /// `dst_offset`.
    ///
    /// Resolves are recorded into the same command stream as slot ends, so
    /// program order is the only ordering guarantee between instances.
    fn record_slot_resolve(
        &self,
        slots: &SlotArray,
        index: u32,
        dst: &ReadbackRegion,
        dst_offset: u64,
    );
}
