//! LAG membership primitives.

use crate::error::DriverResult;
use crate::types::{DevId, LagId, PortMap, RemoteLagCount, SessionHandle};

/// Driver primitives for the LAG table.
pub trait LagApi: Send + Sync {
    /// Sets the local port membership of a LAG.
    fn lag_set_membership(
        &self,
        sess: SessionHandle,
        dev: DevId,
        lag: LagId,
        ports: &PortMap,
    ) -> DriverResult<()>;

    /// Reads the local port membership of a LAG.
    fn lag_get_membership(&self, sess: SessionHandle, dev: DevId, lag: LagId)
        -> DriverResult<PortMap>;

    /// Sets the remote member counts of a LAG.
    fn lag_set_remote_count(
        &self,
        sess: SessionHandle,
        dev: DevId,
        lag: LagId,
        count: RemoteLagCount,
    ) -> DriverResult<()>;

    /// Reads the remote member counts of a LAG.
    fn lag_get_remote_count(
        &self,
        sess: SessionHandle,
        dev: DevId,
        lag: LagId,
    ) -> DriverResult<RemoteLagCount>;
}
