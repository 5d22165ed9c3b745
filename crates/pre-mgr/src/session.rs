//! Scoped hardware batching on top of the session façade.
//!
//! Batching is independent of the device state lock: a batch may span
//! operations on several devices, and operations may run outside a batch.

use pre_driver::{PreDriver, SessionHandle};
use tracing::warn;

use crate::context::PreContext;
use crate::error::{DriverResultExt, PreResult};

/// An open batch on one session.
///
/// [`BatchScope::commit`] pushes the queued calls and waits for hardware.
/// Dropping the scope without committing still closes the batch, without
/// waiting for hardware.
#[must_use = "dropping the scope ends the batch immediately"]
pub struct BatchScope<'a> {
    driver: &'a dyn PreDriver,
    sess: SessionHandle,
    open: bool,
}

impl<'a> BatchScope<'a> {
    pub fn session(&self) -> SessionHandle {
        self.sess
    }

    pub fn commit(mut self) -> PreResult<()> {
        self.open = false;
        self.driver.end_batch(self.sess, true).during("end_batch")
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.driver.end_batch(self.sess, false) {
                warn!(session = self.sess.0, error = %e, "Failed to close PRE batch");
            }
        }
    }
}

impl PreContext {
    /// Opens a batch on `sess`.
    pub fn begin_batch(&self, sess: SessionHandle) -> PreResult<BatchScope<'_>> {
        self.driver().begin_batch(sess).during("begin_batch")?;
        Ok(BatchScope {
            driver: self.driver(),
            sess,
            open: true,
        })
    }
}
