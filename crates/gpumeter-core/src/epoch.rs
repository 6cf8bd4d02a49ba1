//! Submission epochs.
//!
//! An epoch identifies a batch of GPU work submitted together. The CPU and
//! GPU timelines are reconciled by comparing two counters: the *current*
//! epoch (the batch being recorded, not yet submitted) and the *completed*
//! epoch (the last batch the GPU has confirmed finished). Completed never
//! exceeds current.

use std::fmt;

/// Identifier for a batch of submitted GPU work.
///
/// Epochs are monotonically non-decreasing and process-wide. Epoch zero
/// precedes all submitted work; an operation whose last issue was epoch zero
/// is complete by definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(pub u64);

impl Epoch {
    /// The epoch before any work was submitted. Always complete.
    pub const ZERO: Self = Self(0);

    /// Construct an epoch from its raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The epoch after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The epoch before this one, saturating at zero.
    #[must_use]
    pub const fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}", self.0)
    }
}
