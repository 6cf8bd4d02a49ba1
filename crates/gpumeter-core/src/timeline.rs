//! Submission timeline: epoch accounting and flush control.

use crate::epoch::Epoch;
use crate::error::Result;

/// Epoch accounting for a GPU command stream.
///
/// The timeline hands out a monotonically increasing epoch per submitted
/// batch and reports how far the GPU has progressed. The invariant
/// `completed_epoch() <= current_epoch()` holds at all times.
pub trait SubmissionTimeline: Send + Sync {
    /// Epoch of the batch currently being recorded (not yet submitted).
    fn current_epoch(&self) -> Epoch;

    /// Epoch a flush would actually signal: the open batch if it already has
    /// commands, otherwise the most recently submitted batch.
    ///
    /// Recording an operation's end against this epoch avoids forcing a
    /// useless empty submission later just to satisfy a readiness check.
    fn current_epoch_with_commands(&self) -> Epoch {
        self.current_epoch()
    }

    /// Last epoch the GPU has confirmed finished.
    fn completed_epoch(&self) -> Epoch;

    /// Submit the open batch. Starts GPU work but does not wait for it.
    ///
    /// May fail on allocation or device loss; callers that cannot fail must
    /// downgrade the error themselves (see
    /// [`DeferredQuery::flush_and_prep`](crate::DeferredQuery::flush_and_prep)).
    fn submit_pending(&self) -> Result<()>;

    /// Submit any recorded work, then block until every submitted batch has
    /// completed. The only blocking operation in the measurement core.
    fn wait_idle(&self) -> Result<()>;

    /// Note that commands were recorded into the open batch by someone other
    /// than the timeline's own encoders, so its bookkeeping stays accurate.
    fn commands_recorded(&self);
}
