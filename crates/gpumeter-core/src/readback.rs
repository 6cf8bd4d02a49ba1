//! CPU-visible readback storage.
//!
//! The GPU resolves raw measurement data into regions owned by a
//! [`ReadbackHeap`]. Regions are mapped only transiently: [`MappedRegion`]
//! scopes every mapping and guarantees the matching unmap on every exit
//! path, carrying the CPU-written byte range back to the heap.

use std::ops::Range;
use std::ptr::NonNull;

use crate::epoch::Epoch;
use crate::error::Result;

/// Handle to a CPU-visible storage region owned by a [`ReadbackHeap`].
#[derive(Debug)]
pub struct ReadbackRegion {
    id: u64,
    size: u64,
}

impl ReadbackRegion {
    /// Construct a handle. Called by heap implementations.
    #[must_use]
    pub fn new(id: u64, size: u64) -> Self {
        Self { id, size }
    }

    /// Implementation-defined region identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Region size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Allocator for CPU-visible regions the GPU resolves measurement data into.
pub trait ReadbackHeap: Send + Sync {
    /// Allocate a region of at least `size` bytes.
    fn allocate(&self, size: u64) -> Result<ReadbackRegion>;

    /// Return a region to the allocator.
    ///
    /// The allocator must defer reuse until `last_used` completes; the GPU
    /// may still be writing into the region until then.
    fn release(&self, region: ReadbackRegion, last_used: Epoch);

    /// Map the region for CPU access, with bytes `read.start..read.end`
    /// guaranteed coherent for reads.
    ///
    /// Returns a pointer to the start of the region, valid until
    /// [`unmap`](Self::unmap) and aligned to at least 8 bytes (all
    /// measurement layouts are arrays of 64-bit counters). Prefer
    /// [`MappedRegion::map`], which guarantees the matching unmap.
    fn map(&self, region: &ReadbackRegion, read: Range<u64>) -> Result<NonNull<u8>>;

    /// Unmap a mapped region, reporting which bytes the CPU wrote.
    fn unmap(&self, region: &ReadbackRegion, written: Range<u64>);
}

/// Scoped mapping of a [`ReadbackRegion`].
///
/// Unmaps on drop, including on error paths. The written range defaults to
/// empty; callers that modify mapped memory report it with
/// [`mark_written`](Self::mark_written) before the guard drops.
pub struct MappedRegion<'a> {
    heap: &'a dyn ReadbackHeap,
    region: &'a ReadbackRegion,
    ptr: NonNull<u8>,
    len: usize,
    written: Range<u64>,
}

impl<'a> MappedRegion<'a> {
    /// Map `read` bytes of `region` on `heap`.
    pub fn map(
        heap: &'a dyn ReadbackHeap,
        region: &'a ReadbackRegion,
        read: Range<u64>,
    ) -> Result<Self> {
        debug_assert!(read.end <= region.size(), "read range exceeds region");
        let len = read.end as usize;
        let ptr = heap.map(region, read)?;
        Ok(Self {
            heap,
            region,
            ptr,
            len,
            written: 0..0,
        })
    }

    /// Mapped bytes, from the start of the region through the requested read
    /// range.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the heap keeps `ptr` valid for `len` bytes until unmap,
        // and the region is exclusively owned by a single query object.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of the mapped bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as `as_slice`, and `&mut self` makes the view exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Record the byte range the CPU wrote, reported to the heap at unmap.
    pub fn mark_written(&mut self, written: Range<u64>) {
        self.written = written;
    }
}

impl Drop for MappedRegion<'_> {
    fn drop(&mut self) {
        self.heap.unmap(self.region, self.written.clone());
    }
}
