//! Per-port PRE attributes.
//!
//! Every attribute has its own primitive so that callers only touch the
//! fields they intend to change.

use crate::error::DriverResult;
use crate::types::{DevId, DevPort, SessionHandle};

/// Driver primitives for per-port replication attributes.
pub trait PortApi: Send + Sync {
    /// Sets the protection (backup) port of `port`.
    fn port_set_backup(
        &self,
        sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        backup: DevPort,
    ) -> DriverResult<()>;

    /// Reads the protection (backup) port of `port`.
    fn port_get_backup(&self, sess: SessionHandle, dev: DevId, port: DevPort)
        -> DriverResult<DevPort>;

    /// Enables or disables multicast forwarding towards `port`.
    fn port_set_forward_state(
        &self,
        sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        enabled: bool,
    ) -> DriverResult<()>;

    /// Reads the multicast forwarding state of `port`.
    fn port_get_forward_state(&self, sess: SessionHandle, dev: DevId, port: DevPort)
        -> DriverResult<bool>;

    /// Clears the fast-failover state latched for `port`.
    fn port_clear_fast_failover(&self, sess: SessionHandle, dev: DevId, port: DevPort)
        -> DriverResult<()>;

    /// Enables or disables `port` as the copy-to-CPU port.
    fn port_set_copy_to_cpu(
        &self,
        sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        enabled: bool,
    ) -> DriverResult<()>;

    /// Reads whether `port` is enabled as the copy-to-CPU port.
    fn port_get_copy_to_cpu(&self, sess: SessionHandle, dev: DevId, port: DevPort)
        -> DriverResult<bool>;
}
