//! L2 exclusion (port pruning) primitives.

use crate::error::DriverResult;
use crate::types::{DevId, L2Xid, PortMap, SessionHandle};

/// Driver primitives for the prune table.
pub trait PruneApi: Send + Sync {
    /// Sets the ports excluded from replication for `l2_xid`.
    fn prune_set(
        &self,
        sess: SessionHandle,
        dev: DevId,
        l2_xid: L2Xid,
        ports: &PortMap,
    ) -> DriverResult<()>;

    /// Reads the ports excluded from replication for `l2_xid`.
    fn prune_get(&self, sess: SessionHandle, dev: DevId, l2_xid: L2Xid) -> DriverResult<PortMap>;
}
