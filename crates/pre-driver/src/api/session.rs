//! Session batching façade.
//!
//! Batching groups several driver calls into one transport exchange. It is
//! independent of any state lock held by the callers of the driver.

use crate::error::DriverResult;
use crate::types::SessionHandle;

/// Driver primitives for session batching.
pub trait SessionApi: Send + Sync {
    /// Starts queueing driver calls issued on `sess`.
    fn begin_batch(&self, sess: SessionHandle) -> DriverResult<()>;

    /// Pushes the queued calls to hardware. With `hw_sync` the call returns
    /// only after hardware has acknowledged them.
    fn end_batch(&self, sess: SessionHandle, hw_sync: bool) -> DriverResult<()>;

    /// Returns true while a batch is open on `sess`.
    fn batch_in_progress(&self, sess: SessionHandle) -> bool;
}
