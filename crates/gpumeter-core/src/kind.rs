//! Query kinds and their counter layouts.
//!
//! Every kind encodes its result as an array of 64-bit counters. The layout
//! table below is the single source of truth for counter counts, encoded
//! sizes, the GPU slot flavor a kind records into, and the reduction applied
//! when a result is read back. Accumulation logic never hardcodes per-kind
//! arithmetic.

use std::mem;

/// Reduction applied when a query result is delivered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Counters from all recorded instances are summed into the destination.
    Sum,
    /// The accumulated counter replaces the destination's current contents
    /// only if it is larger. Used for timestamps, where repeated reads keep
    /// the latest (largest) observed value.
    Max,
}

/// GPU slot-array flavor backing a query kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Timestamp slots.
    Timestamp,
    /// Occlusion (sample-passed) slots.
    Occlusion,
    /// Stream-output statistics slots.
    StreamOutput,
    /// Pipeline statistics slots.
    PipelineStatistics,
}

impl SlotKind {
    /// Number of 64-bit counters one slot of this flavor records.
    #[must_use]
    pub const fn counters(self) -> usize {
        match self {
            Self::Timestamp => 1,
            Self::Occlusion => 1,
            Self::StreamOutput => 2,
            Self::PipelineStatistics => 11,
        }
    }
}

/// Measurement kinds supported by [`Query`](crate::Query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// A point-in-time GPU clock sample. One counter; reads take the max.
    Timestamp,
    /// Samples that passed depth/stencil testing. One counter; reads sum.
    Occlusion,
    /// Primitives written and needed by stream output. Two counters; reads sum.
    StreamOutputStatistics,
    /// Per-stage invocation and primitive counts. Eleven counters; reads sum.
    PipelineStatistics,
}

impl QueryKind {
    /// All supported kinds.
    pub const ALL: [QueryKind; 4] = [
        QueryKind::Timestamp,
        QueryKind::Occlusion,
        QueryKind::StreamOutputStatistics,
        QueryKind::PipelineStatistics,
    ];

    /// Slot-array flavor this kind records into.
    #[must_use]
    pub const fn slot_kind(self) -> SlotKind {
        match self {
            Self::Timestamp => SlotKind::Timestamp,
            Self::Occlusion => SlotKind::Occlusion,
            Self::StreamOutputStatistics => SlotKind::StreamOutput,
            Self::PipelineStatistics => SlotKind::PipelineStatistics,
        }
    }

    /// Number of 64-bit counters one recorded instance carries.
    #[must_use]
    pub const fn counters(self) -> usize {
        self.slot_kind().counters()
    }

    /// Encoded byte size of one instance's data.
    #[must_use]
    pub const fn data_size(self) -> usize {
        self.counters() * mem::size_of::<u64>()
    }

    /// Reduction applied when the result is read back.
    #[must_use]
    pub const fn reduction(self) -> Reduction {
        match self {
            Self::Timestamp => Reduction::Max,
            _ => Reduction::Sum,
        }
    }
}

/// Capacity of the accumulation scratch buffer, in 64-bit counters.
///
/// Sized to the widest supported layout; the assertions below keep the table
/// and this constant in lockstep.
pub const MAX_QUERY_COUNTERS: usize = 12;

const _: () = assert!(QueryKind::Timestamp.counters() <= MAX_QUERY_COUNTERS);
const _: () = assert!(QueryKind::Occlusion.counters() <= MAX_QUERY_COUNTERS);
const _: () = assert!(QueryKind::StreamOutputStatistics.counters() <= MAX_QUERY_COUNTERS);
const _: () = assert!(QueryKind::PipelineStatistics.counters() <= MAX_QUERY_COUNTERS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_table() {
        assert_eq!(QueryKind::Timestamp.counters(), 1);
        assert_eq!(QueryKind::Timestamp.data_size(), 8);
        assert_eq!(QueryKind::Occlusion.data_size(), 8);
        assert_eq!(QueryKind::StreamOutputStatistics.data_size(), 16);
        assert_eq!(QueryKind::PipelineStatistics.counters(), 11);
        assert_eq!(QueryKind::PipelineStatistics.data_size(), 88);
    }

    #[test]
    fn test_reductions() {
        assert_eq!(QueryKind::Timestamp.reduction(), Reduction::Max);
        assert_eq!(QueryKind::Occlusion.reduction(), Reduction::Sum);
        assert_eq!(QueryKind::StreamOutputStatistics.reduction(), Reduction::Sum);
        assert_eq!(QueryKind::PipelineStatistics.reduction(), Reduction::Sum);
    }

    #[test]
    fn test_every_kind_fits_scratch() {
        for kind in QueryKind::ALL {
            assert!(kind.counters() <= MAX_QUERY_COUNTERS);
        }
    }

    #[test]
    fn test_slot_kind_mapping() {
        assert_eq!(QueryKind::Timestamp.slot_kind(), SlotKind::Timestamp);
        assert_eq!(
            QueryKind::StreamOutputStatistics.slot_kind(),
            SlotKind::StreamOutput
        );
        for kind in QueryKind::ALL {
            assert_eq!(kind.counters(), kind.slot_kind().counters());
        }
    }
}
