//! Query error types.

use thiserror::Error;

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors surfaced by the query lifecycle.
///
/// A result that is merely not ready yet is not an error; readiness is
/// reported as a `bool` by [`DeferredQuery::get_data`](crate::DeferredQuery::get_data).
#[derive(Debug, Error)]
pub enum QueryError {
    /// Creating the GPU-visible slot array failed.
    #[error("Slot array allocation failed: {0}")]
    SlotAllocationFailed(String),

    /// Allocating a CPU-visible readback region failed.
    #[error("Readback allocation of {size} bytes failed: {reason}")]
    AllocationFailed {
        /// Requested size in bytes.
        size: u64,
        /// Allocator-reported reason.
        reason: String,
    },

    /// Submitting the open command batch failed.
    #[error("Command submission failed: {0}")]
    SubmitFailed(String),

    /// Waiting for the device to go idle failed.
    #[error("Wait for device idle failed: {0}")]
    WaitFailed(String),

    /// Mapping a readback region for CPU access failed.
    #[error("Readback map failed: {0}")]
    MapFailed(String),

    /// The caller-supplied destination cannot hold the query kind's result.
    #[error("Destination too small: need {required} bytes, got {provided}")]
    DestinationTooSmall {
        /// Bytes the query kind encodes to.
        required: usize,
        /// Bytes the caller provided.
        provided: usize,
    },

    /// Backend-specific failure.
    #[error("Backend error: {0}")]
    Backend(String),
}
