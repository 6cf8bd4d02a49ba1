//! # gpumeter-core
//!
//! Core traits and types for asynchronous GPU measurement lifecycles.
//!
//! A measurement is requested on the CPU, executed by the GPU at some later
//! point, and read back on the CPU later still. This crate reconciles those
//! three timelines with submission [`Epoch`]s, a non-blocking readiness
//! gate, and a rotating-instance [`Query`] object that folds unbounded
//! suspend/resume cycles into fixed-capacity GPU storage.
//!
//! Everything GPU-side is reached through traits ([`SubmissionTimeline`],
//! [`ReadbackHeap`], [`QueryBackend`]); backends implement them over a real
//! device, and the `gpumeter-cpu` crate provides a deterministic software
//! implementation for tests.
//!
//! ## Example
//!
//! ```ignore
//! use gpumeter_core::{DeferredQuery, Query, QueryDesc, QueryKind};
//!
//! let mut query = Query::new(backend, QueryDesc::new(QueryKind::Occlusion))?;
//! // ... GPU work ...
//! query.end();
//!
//! let mut result = [0u8; 8];
//! while !query.get_data(Some(&mut result), false, false)? {
//!     // result not ready; do other work
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod backend;
pub mod epoch;
pub mod error;
pub mod kind;
pub mod query;
pub mod readback;
pub mod timeline;
pub mod timestamp;

pub use backend::{QueryBackend, SlotArray};
pub use epoch::Epoch;
pub use error::{QueryError, Result};
pub use kind::{QueryKind, Reduction, SlotKind, MAX_QUERY_COUNTERS};
pub use query::{DeferredQuery, Query, QueryDesc};
pub use readback::{MappedRegion, ReadbackHeap, ReadbackRegion};
pub use timeline::SubmissionTimeline;
pub use timestamp::TimestampQuery;
