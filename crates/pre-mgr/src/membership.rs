//! Reading member lists back from the driver.
//!
//! The driver exposes a member list in three steps: the first member, the
//! member count, then the remaining members in one batched call. The batched
//! call fills a caller-sized buffer and pads unused slots with the all-ones
//! sentinel; the list may shrink between the count and the read, so the
//! reader keeps only the prefix before the first sentinel.

use pre_driver::{
    DevId, DriverResult, EcmpApi, EcmpHdl, EcmpMember, GroupMember, MgidApi, MgidHdl, NodeHdl,
    NodeMember, PreDriver, PreHandle, PreObjectKind, SessionHandle,
};

use crate::directory::Directory;
use crate::error::{PreError, PreResult};
use crate::types::ObjectId;

/// A buffer slot of a batched member read.
pub trait MemberSlot: Copy {
    fn sentinel() -> Self;
    fn is_sentinel(&self) -> bool;
}

impl<K: PreObjectKind> MemberSlot for PreHandle<K> {
    fn sentinel() -> Self {
        PreHandle::SENTINEL
    }

    fn is_sentinel(&self) -> bool {
        PreHandle::is_sentinel(self)
    }
}

impl<K: PreObjectKind> MemberSlot for GroupMember<K> {
    fn sentinel() -> Self {
        GroupMember::sentinel()
    }

    fn is_sentinel(&self) -> bool {
        self.handle.is_sentinel()
    }
}

/// One member list as exposed by the driver.
pub trait MemberSource {
    type Member: MemberSlot;

    fn first(&self) -> DriverResult<Self::Member>;
    fn count(&self) -> DriverResult<u32>;
    fn next_n(&self, after: Self::Member, out: &mut [Self::Member]) -> DriverResult<()>;
}

/// Largest member count a list read will size a buffer for.
pub const MAX_MEMBERS: usize = u16::MAX as usize;

/// Reads a whole member list. An empty list is reported by the first-member
/// call as not-found and yields an empty vector. A reported count above
/// [`MAX_MEMBERS`] is Unexpected.
pub fn read_members<S: MemberSource>(source: &S) -> PreResult<Vec<S::Member>> {
    let first = match source.first() {
        Ok(member) => member,
        Err(e) if e.is_not_found() => return Ok(Vec::new()),
        Err(e) => return Err(PreError::driver("get_first_member", e)),
    };
    let count = source
        .count()
        .map_err(|e| PreError::driver("get_member_count", e))? as usize;
    if count > MAX_MEMBERS {
        return Err(PreError::unexpected(format!(
            "driver reported {} members, more than {}",
            count, MAX_MEMBERS
        )));
    }

    let mut members = Vec::with_capacity(count.max(1));
    members.push(first);
    if count > 1 {
        let mut buf = vec![S::Member::sentinel(); count - 1];
        source
            .next_n(first, &mut buf)
            .map_err(|e| PreError::driver("get_next_members", e))?;
        members.extend(buf.into_iter().take_while(|m| !m.is_sentinel()));
    }
    Ok(members)
}

/// Node branches of a group.
pub struct GroupNodes<'a> {
    pub driver: &'a dyn PreDriver,
    pub sess: SessionHandle,
    pub dev: DevId,
    pub mgrp: MgidHdl,
}

impl MemberSource for GroupNodes<'_> {
    type Member = NodeMember;

    fn first(&self) -> DriverResult<NodeMember> {
        self.driver
            .mgrp_get_first_node_member(self.sess, self.dev, self.mgrp)
    }

    fn count(&self) -> DriverResult<u32> {
        self.driver
            .mgrp_get_node_member_count(self.sess, self.dev, self.mgrp)
    }

    fn next_n(&self, after: NodeMember, out: &mut [NodeMember]) -> DriverResult<()> {
        self.driver
            .mgrp_get_next_node_members(self.sess, self.dev, self.mgrp, after.handle, out)
    }
}

/// ECMP branches of a group.
pub struct GroupEcmps<'a> {
    pub driver: &'a dyn PreDriver,
    pub sess: SessionHandle,
    pub dev: DevId,
    pub mgrp: MgidHdl,
}

impl MemberSource for GroupEcmps<'_> {
    type Member = EcmpMember;

    fn first(&self) -> DriverResult<EcmpMember> {
        self.driver
            .mgrp_get_first_ecmp_member(self.sess, self.dev, self.mgrp)
    }

    fn count(&self) -> DriverResult<u32> {
        self.driver
            .mgrp_get_ecmp_member_count(self.sess, self.dev, self.mgrp)
    }

    fn next_n(&self, after: EcmpMember, out: &mut [EcmpMember]) -> DriverResult<()> {
        self.driver
            .mgrp_get_next_ecmp_members(self.sess, self.dev, self.mgrp, after.handle, out)
    }
}

/// Nodes of an ECMP set.
pub struct EcmpNodes<'a> {
    pub driver: &'a dyn PreDriver,
    pub sess: SessionHandle,
    pub dev: DevId,
    pub ecmp: EcmpHdl,
}

impl MemberSource for EcmpNodes<'_> {
    type Member = NodeHdl;

    fn first(&self) -> DriverResult<NodeHdl> {
        self.driver.ecmp_get_first_member(self.sess, self.dev, self.ecmp)
    }

    fn count(&self) -> DriverResult<u32> {
        self.driver.ecmp_get_member_count(self.sess, self.dev, self.ecmp)
    }

    fn next_n(&self, after: NodeHdl, out: &mut [NodeHdl]) -> DriverResult<()> {
        self.driver
            .ecmp_get_next_members(self.sess, self.dev, self.ecmp, after, out)
    }
}

/// Maps a handle read back from the driver to its caller id. A handle the
/// directory does not know means the two stores diverged.
pub fn resolve_id<K: PreObjectKind>(
    dir: &Directory<K>,
    handle: PreHandle<K>,
) -> PreResult<ObjectId> {
    dir.id_of(handle).map_err(|_| {
        PreError::unexpected(format!(
            "driver returned {:?} which has no directory entry",
            handle
        ))
    })
}
