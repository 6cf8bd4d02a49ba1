//! # gpumeter
//!
//! Asynchronous GPU measurement (query) lifecycle management.
//!
//! Measurements are issued into a GPU command stream, tracked across
//! submission epochs, and read back through a gate that flushes pending
//! work and blocks only when the caller asks it to. See `gpumeter-core`
//! for the trait surface backends implement; the `cpu` feature (default)
//! re-exports the deterministic software device.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gpumeter::prelude::*;
//! use gpumeter::cpu::SoftDevice;
//!
//! let device = Arc::new(SoftDevice::new());
//! let mut timer = TimestampQuery::new(device.clone())?;
//!
//! device.set_counter(1_000);
//! timer.end();
//! assert_eq!(timer.read()?, 1_000);
//! # Ok::<(), QueryError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use gpumeter_core::{backend, epoch, error, kind, query, readback, timeline, timestamp};

pub use gpumeter_core::{
    DeferredQuery, Epoch, MappedRegion, Query, QueryBackend, QueryDesc, QueryError, QueryKind,
    ReadbackHeap, ReadbackRegion, Reduction, Result, SlotArray, SlotKind, SubmissionTimeline,
    TimestampQuery, MAX_QUERY_COUNTERS,
};

/// Deterministic software device, for tests and examples.
#[cfg(feature = "cpu")]
pub use gpumeter_cpu as cpu;

/// Convenient imports for common usage.
pub mod prelude {
    pub use gpumeter_core::{
        DeferredQuery, Epoch, Query, QueryBackend, QueryDesc, QueryError, QueryKind, ReadbackHeap,
        Reduction, Result, SlotKind, SubmissionTimeline, TimestampQuery,
    };
}
