//! Timestamp convenience query.

use std::sync::Arc;

use crate::backend::QueryBackend;
use crate::error::Result;
use crate::kind::QueryKind;
use crate::query::{DeferredQuery, Query, QueryDesc};
use crate::timeline::SubmissionTimeline;

/// A single-shot GPU timestamp.
///
/// Wraps a timestamp [`Query`] with the minimal surface most callers need:
/// [`end`](Self::end) samples the GPU clock at the current point in the
/// command stream, and [`read`](Self::read) blocks until the sample is
/// available. Re-ending the query takes a fresh sample.
pub struct TimestampQuery {
    inner: Query,
}

impl TimestampQuery {
    /// Create a timestamp query on `backend`.
    pub fn new(backend: Arc<dyn QueryBackend>) -> Result<Self> {
        let desc = QueryDesc::new(QueryKind::Timestamp).with_capacity(1);
        Ok(Self {
            inner: Query::new(backend, desc)?,
        })
    }

    /// Record a GPU clock sample at the current point in the command stream.
    pub fn end(&mut self) {
        self.inner.end();
    }

    /// Read the sampled timestamp, flushing and waiting as needed.
    pub fn read(&mut self) -> Result<u64> {
        let mut dest = [0u8; 8];
        if !self.inner.get_data(Some(&mut dest), false, false)? {
            self.inner.backend().wait_idle()?;
            let ready = self.inner.get_data(Some(&mut dest), false, false)?;
            debug_assert!(ready, "wait_idle guarantees completion");
        }
        Ok(u64::from_ne_bytes(dest))
    }

    /// Probe for the sampled timestamp without forcing submission.
    ///
    /// Returns `None` while the sample is not yet available.
    pub fn try_read(&self) -> Result<Option<u64>> {
        let mut dest = [0u8; 8];
        if self.inner.get_data(Some(&mut dest), true, false)? {
            Ok(Some(u64::from_ne_bytes(dest)))
        } else {
            Ok(None)
        }
    }
}
