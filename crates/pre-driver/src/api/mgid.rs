//! Multicast group primitives.
//!
//! A group object is the root of a replication tree. Its children are L1
//! nodes and ECMP sets, each attached with an optional L1 exclusion id.

use crate::error::DriverResult;
use crate::types::{
    DevId, EcmpHdl, EcmpKind, GroupMember, L1Xid, Mgid, MgidHdl, NodeHdl, NodeKind,
    SessionHandle,
};

/// Group member slot for node children.
pub type NodeMember = GroupMember<NodeKind>;

/// Group member slot for ECMP children.
pub type EcmpMember = GroupMember<EcmpKind>;

/// Driver primitives for multicast group objects.
pub trait MgidApi: Send + Sync {
    /// Allocates the hardware group for `mgid` and returns its handle.
    fn mgrp_create(&self, sess: SessionHandle, dev: DevId, mgid: Mgid) -> DriverResult<MgidHdl>;

    /// Releases a group and all of its associations.
    fn mgrp_destroy(&self, sess: SessionHandle, dev: DevId, mgrp: MgidHdl) -> DriverResult<()>;

    /// Attaches a node as a branch of the group.
    fn mgrp_associate_node(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        node: NodeHdl,
        l1_xid: Option<L1Xid>,
    ) -> DriverResult<()>;

    /// Detaches a node branch.
    fn mgrp_dissociate_node(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        node: NodeHdl,
    ) -> DriverResult<()>;

    /// Attaches an ECMP set as a branch of the group.
    fn mgrp_associate_ecmp(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        ecmp: EcmpHdl,
        l1_xid: Option<L1Xid>,
    ) -> DriverResult<()>;

    /// Detaches an ECMP branch.
    fn mgrp_dissociate_ecmp(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        ecmp: EcmpHdl,
    ) -> DriverResult<()>;

    /// First node branch. Fails with a not-found error when there is none.
    fn mgrp_get_first_node_member(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<NodeMember>;

    /// Number of node branches.
    fn mgrp_get_node_member_count(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<u32>;

    /// Fills `out` with the node branches following `after`.
    ///
    /// Slots past the end of the list are written with the sentinel.
    fn mgrp_get_next_node_members(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        after: NodeHdl,
        out: &mut [NodeMember],
    ) -> DriverResult<()>;

    /// First ECMP branch. Fails with a not-found error when there is none.
    fn mgrp_get_first_ecmp_member(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<EcmpMember>;

    /// Number of ECMP branches.
    fn mgrp_get_ecmp_member_count(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<u32>;

    /// Fills `out` with the ECMP branches following `after`, sentinel-padded.
    fn mgrp_get_next_ecmp_members(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        after: EcmpHdl,
        out: &mut [EcmpMember],
    ) -> DriverResult<()>;

    /// Number of live group objects on the device.
    fn mgrp_get_count(&self, sess: SessionHandle, dev: DevId) -> DriverResult<u32>;
}
