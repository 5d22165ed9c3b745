//! ECMP set primitives.
//!
//! An ECMP set is a list of nodes of which the hardware picks one per packet.

use crate::error::DriverResult;
use crate::types::{DevId, EcmpHdl, NodeHdl, SessionHandle};

/// Driver primitives for ECMP sets.
pub trait EcmpApi: Send + Sync {
    /// Allocates an empty ECMP set.
    fn ecmp_create(&self, sess: SessionHandle, dev: DevId) -> DriverResult<EcmpHdl>;

    /// Releases an ECMP set. Fails while the set is a group member.
    fn ecmp_destroy(&self, sess: SessionHandle, dev: DevId, ecmp: EcmpHdl) -> DriverResult<()>;

    /// Appends a node to the set.
    fn ecmp_member_add(
        &self,
        sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        node: NodeHdl,
    ) -> DriverResult<()>;

    /// Removes a node from the set.
    fn ecmp_member_remove(
        &self,
        sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        node: NodeHdl,
    ) -> DriverResult<()>;

    /// Replaces the whole membership in one call.
    fn ecmp_member_replace(
        &self,
        sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        nodes: &[NodeHdl],
    ) -> DriverResult<()>;

    /// First member. Fails with a not-found error when the set is empty.
    fn ecmp_get_first_member(
        &self,
        sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
    ) -> DriverResult<NodeHdl>;

    /// Number of members.
    fn ecmp_get_member_count(
        &self,
        sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
    ) -> DriverResult<u32>;

    /// Fills `out` with the members following `after`, sentinel-padded.
    fn ecmp_get_next_members(
        &self,
        sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        after: NodeHdl,
        out: &mut [NodeHdl],
    ) -> DriverResult<()>;

    /// Number of live ECMP sets on the device.
    fn ecmp_get_count(&self, sess: SessionHandle, dev: DevId) -> DriverResult<u32>;
}
