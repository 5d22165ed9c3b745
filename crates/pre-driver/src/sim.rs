//! In-memory model of the PRE object store.
//!
//! `SimDriver` implements every driver trait against plain maps so the
//! resource managers can run without an ASIC. It also offers the knobs tests
//! need to exercise failure paths:
//!
//! - fault injection per primitive ([`SimDriver::fail_next`],
//!   [`SimDriver::fail_after`], [`SimDriver::fail_always`])
//! - per-primitive call counters
//! - truncation of next-N member reads, to reproduce a list that shrinks
//!   between the count and the read
//!
//! Model rules: a node cannot be destroyed while it is a group or ECMP member,
//! an ECMP set cannot be destroyed while it is a group member, and destroying a
//! group drops its associations.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use parking_lot::Mutex;

use crate::api::mgid::{EcmpMember, NodeMember};
use crate::api::{EcmpApi, LagApi, MgidApi, NodeApi, PortApi, PruneApi, SessionApi};
use crate::error::{DriverError, DriverResult, PreStatus};
use crate::types::{
    DevId, DevPort, EcmpHdl, L1Xid, L2Xid, LagId, LagMap, Mgid, MgidHdl, NodeAttr, NodeHdl,
    PortMap, RawHandle, RemoteLagCount, SessionHandle,
};

#[derive(Debug, Clone, Copy)]
struct Fault {
    skip: u32,
    status: PreStatus,
    persistent: bool,
}

#[derive(Debug, Clone)]
struct SimGroup {
    mgid: Mgid,
    nodes: Vec<NodeMember>,
    ecmps: Vec<EcmpMember>,
}

#[derive(Debug, Clone, Copy)]
struct SimPort {
    backup: DevPort,
    forward: bool,
    copy_to_cpu: bool,
    ff_clears: u32,
}

impl SimPort {
    fn new(port: DevPort) -> Self {
        Self {
            backup: port,
            forward: true,
            copy_to_cpu: false,
            ff_clears: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SimDevice {
    mgrps: BTreeMap<RawHandle, SimGroup>,
    nodes: BTreeMap<RawHandle, NodeAttr>,
    ecmps: BTreeMap<RawHandle, Vec<NodeHdl>>,
    lags: HashMap<LagId, (PortMap, RemoteLagCount)>,
    prune: HashMap<L2Xid, PortMap>,
    ports: HashMap<DevPort, SimPort>,
}

impl SimDevice {
    fn group(&mut self, mgrp: MgidHdl) -> DriverResult<&mut SimGroup> {
        self.mgrps
            .get_mut(&mgrp.as_raw())
            .ok_or_else(|| DriverError::invalid_parameter(format!("unknown group {:?}", mgrp)))
    }

    fn ecmp(&mut self, ecmp: EcmpHdl) -> DriverResult<&mut Vec<NodeHdl>> {
        self.ecmps
            .get_mut(&ecmp.as_raw())
            .ok_or_else(|| DriverError::invalid_parameter(format!("unknown ECMP {:?}", ecmp)))
    }

    fn check_node(&self, node: NodeHdl) -> DriverResult<()> {
        if self.nodes.contains_key(&node.as_raw()) {
            Ok(())
        } else {
            Err(DriverError::invalid_parameter(format!("unknown node {:?}", node)))
        }
    }

    fn node_in_use(&self, node: NodeHdl) -> bool {
        self.mgrps
            .values()
            .any(|g| g.nodes.iter().any(|m| m.handle == node))
            || self.ecmps.values().any(|members| members.contains(&node))
    }

    fn ecmp_in_use(&self, ecmp: EcmpHdl) -> bool {
        self.mgrps
            .values()
            .any(|g| g.ecmps.iter().any(|m| m.handle == ecmp))
    }

    fn port(&mut self, port: DevPort) -> DriverResult<&mut SimPort> {
        if port as usize >= PortMap::CAPACITY {
            return Err(DriverError::from_status(PreStatus::InvalidPort));
        }
        Ok(self.ports.entry(port).or_insert_with(|| SimPort::new(port)))
    }
}

#[derive(Debug, Default)]
struct SimInner {
    devices: HashMap<DevId, SimDevice>,
    next_handle: RawHandle,
    faults: HashMap<&'static str, Fault>,
    calls: HashMap<&'static str, u64>,
    next_members_limit: Option<usize>,
    batches: HashSet<SessionHandle>,
}

impl SimInner {
    /// Records the call and applies any fault armed for `op`.
    fn enter(&mut self, op: &'static str) -> DriverResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        let Some(fault) = self.faults.get_mut(op) else {
            return Ok(());
        };
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        let status = fault.status;
        if !fault.persistent {
            self.faults.remove(op);
        }
        debug!("sim: injecting {} into {}", status, op);
        Err(DriverError::from_status(status))
    }

    fn allocate(&mut self) -> RawHandle {
        self.next_handle += 1;
        self.next_handle
    }

    fn device(&mut self, dev: DevId) -> DriverResult<&mut SimDevice> {
        self.devices
            .get_mut(&dev)
            .ok_or_else(|| DriverError::from_status(PreStatus::InvalidDevice))
    }

    fn call(&mut self, op: &'static str, dev: DevId) -> DriverResult<&mut SimDevice> {
        self.enter(op)?;
        self.device(dev)
    }
}

/// Copies the members following a position into a sentinel-padded buffer.
fn fill_next<T: Copy>(rest: &[T], out: &mut [T], sentinel: T, limit: Option<usize>) {
    let valid = limit.map_or(rest.len(), |l| l.min(rest.len()));
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = if i < valid { rest[i] } else { sentinel };
    }
}

/// Raw member handles of a group branch list with their L1 exclusion ids.
pub type SimMembers = Vec<(RawHandle, Option<L1Xid>)>;

/// Point-in-time copy of one device's object store, used to compare states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimSnapshot {
    pub groups: BTreeMap<RawHandle, (Mgid, SimMembers, SimMembers)>,
    pub nodes: BTreeMap<RawHandle, NodeAttr>,
    pub ecmps: BTreeMap<RawHandle, Vec<RawHandle>>,
}

/// Software model of the PRE driver.
#[derive(Debug, Default)]
pub struct SimDriver {
    inner: Mutex<SimInner>,
}

impl SimDriver {
    /// Creates a model with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings up an empty device.
    pub fn add_device(&self, dev: DevId) {
        self.inner.lock().devices.entry(dev).or_default();
    }

    /// Tears a device down together with every object on it.
    pub fn remove_device(&self, dev: DevId) {
        self.inner.lock().devices.remove(&dev);
    }

    /// Fails the next call of `op` with `status`.
    pub fn fail_next(&self, op: &'static str, status: PreStatus) {
        self.fail_after(op, 0, status);
    }

    /// Lets `skip` calls of `op` succeed, then fails the following one.
    pub fn fail_after(&self, op: &'static str, skip: u32, status: PreStatus) {
        self.inner.lock().faults.insert(
            op,
            Fault {
                skip,
                status,
                persistent: false,
            },
        );
    }

    /// Fails every call of `op` until [`SimDriver::clear_faults`].
    pub fn fail_always(&self, op: &'static str, status: PreStatus) {
        self.inner.lock().faults.insert(
            op,
            Fault {
                skip: 0,
                status,
                persistent: true,
            },
        );
    }

    /// Disarms every injected fault.
    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Caps how many valid members a next-N read returns; the rest of the
    /// buffer is sentinel-padded. `None` restores normal behavior.
    pub fn limit_next_members(&self, limit: Option<usize>) {
        self.inner.lock().next_members_limit = limit;
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn call_count(&self, op: &str) -> u64 {
        self.inner.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Number of calls made to any primitive.
    pub fn total_calls(&self) -> u64 {
        self.inner.lock().calls.values().sum()
    }

    /// Resets every call counter.
    pub fn reset_call_counts(&self) {
        self.inner.lock().calls.clear();
    }

    /// Number of live groups on `dev`.
    pub fn group_count(&self, dev: DevId) -> usize {
        self.inner.lock().devices.get(&dev).map_or(0, |d| d.mgrps.len())
    }

    /// Number of live nodes on `dev`.
    pub fn node_count(&self, dev: DevId) -> usize {
        self.inner.lock().devices.get(&dev).map_or(0, |d| d.nodes.len())
    }

    /// Number of live ECMP sets on `dev`.
    pub fn ecmp_count(&self, dev: DevId) -> usize {
        self.inner.lock().devices.get(&dev).map_or(0, |d| d.ecmps.len())
    }

    /// Returns true if `mgrp` is a live group on `dev`.
    pub fn group_exists(&self, dev: DevId, mgrp: MgidHdl) -> bool {
        self.inner
            .lock()
            .devices
            .get(&dev)
            .is_some_and(|d| d.mgrps.contains_key(&mgrp.as_raw()))
    }

    /// Handle of the group programmed for `mgid`, if any.
    pub fn group_handle(&self, dev: DevId, mgid: Mgid) -> Option<MgidHdl> {
        let inner = self.inner.lock();
        let device = inner.devices.get(&dev)?;
        device
            .mgrps
            .iter()
            .find(|(_, g)| g.mgid == mgid)
            .map(|(raw, _)| MgidHdl::from_raw_unchecked(*raw))
    }

    /// Number of fast-failover clears issued for `port`.
    pub fn fast_failover_clears(&self, dev: DevId, port: DevPort) -> u32 {
        self.inner
            .lock()
            .devices
            .get(&dev)
            .and_then(|d| d.ports.get(&port))
            .map_or(0, |p| p.ff_clears)
    }

    /// Copies the object store of `dev`.
    pub fn snapshot(&self, dev: DevId) -> Option<SimSnapshot> {
        let inner = self.inner.lock();
        let device = inner.devices.get(&dev)?;
        let groups = device
            .mgrps
            .iter()
            .map(|(raw, g)| {
                let nodes = g.nodes.iter().map(|m| (m.handle.as_raw(), m.l1_xid)).collect();
                let ecmps = g.ecmps.iter().map(|m| (m.handle.as_raw(), m.l1_xid)).collect();
                (*raw, (g.mgid, nodes, ecmps))
            })
            .collect();
        let ecmps = device
            .ecmps
            .iter()
            .map(|(raw, members)| (*raw, members.iter().map(|n| n.as_raw()).collect()))
            .collect();
        Some(SimSnapshot {
            groups,
            nodes: device.nodes.clone(),
            ecmps,
        })
    }
}

impl MgidApi for SimDriver {
    fn mgrp_create(&self, _sess: SessionHandle, dev: DevId, mgid: Mgid) -> DriverResult<MgidHdl> {
        let mut inner = self.inner.lock();
        if inner
            .call("mgrp_create", dev)?
            .mgrps
            .values()
            .any(|g| g.mgid == mgid)
        {
            return Err(DriverError::already_exists(format!("group for mgid {}", mgid)));
        }
        let raw = inner.allocate();
        inner.device(dev)?.mgrps.insert(
            raw,
            SimGroup {
                mgid,
                nodes: Vec::new(),
                ecmps: Vec::new(),
            },
        );
        Ok(MgidHdl::from_raw_unchecked(raw))
    }

    fn mgrp_destroy(&self, _sess: SessionHandle, dev: DevId, mgrp: MgidHdl) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner
            .call("mgrp_destroy", dev)?
            .mgrps
            .remove(&mgrp.as_raw())
            .map(|_| ())
            .ok_or_else(|| DriverError::not_found(format!("{:?}", mgrp)))
    }

    fn mgrp_associate_node(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        node: NodeHdl,
        l1_xid: Option<L1Xid>,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("mgrp_associate_node", dev)?;
        device.check_node(node)?;
        let group = device.group(mgrp)?;
        if group.nodes.iter().any(|m| m.handle == node) {
            return Err(DriverError::already_exists(format!("{:?} in {:?}", node, mgrp)));
        }
        group.nodes.push(NodeMember::new(node, l1_xid));
        Ok(())
    }

    fn mgrp_dissociate_node(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        node: NodeHdl,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let group = inner.call("mgrp_dissociate_node", dev)?.group(mgrp)?;
        let pos = group
            .nodes
            .iter()
            .position(|m| m.handle == node)
            .ok_or_else(|| DriverError::not_found(format!("{:?} in {:?}", node, mgrp)))?;
        group.nodes.remove(pos);
        Ok(())
    }

    fn mgrp_associate_ecmp(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        ecmp: EcmpHdl,
        l1_xid: Option<L1Xid>,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("mgrp_associate_ecmp", dev)?;
        device.ecmp(ecmp)?;
        let group = device.group(mgrp)?;
        if group.ecmps.iter().any(|m| m.handle == ecmp) {
            return Err(DriverError::already_exists(format!("{:?} in {:?}", ecmp, mgrp)));
        }
        group.ecmps.push(EcmpMember::new(ecmp, l1_xid));
        Ok(())
    }

    fn mgrp_dissociate_ecmp(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        ecmp: EcmpHdl,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let group = inner.call("mgrp_dissociate_ecmp", dev)?.group(mgrp)?;
        let pos = group
            .ecmps
            .iter()
            .position(|m| m.handle == ecmp)
            .ok_or_else(|| DriverError::not_found(format!("{:?} in {:?}", ecmp, mgrp)))?;
        group.ecmps.remove(pos);
        Ok(())
    }

    fn mgrp_get_first_node_member(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<NodeMember> {
        let mut inner = self.inner.lock();
        let group = inner.call("mgrp_get_first_node_member", dev)?.group(mgrp)?;
        group
            .nodes
            .first()
            .copied()
            .ok_or_else(|| DriverError::not_found("node member"))
    }

    fn mgrp_get_node_member_count(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<u32> {
        let mut inner = self.inner.lock();
        let group = inner.call("mgrp_get_node_member_count", dev)?.group(mgrp)?;
        Ok(group.nodes.len() as u32)
    }

    fn mgrp_get_next_node_members(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        after: NodeHdl,
        out: &mut [NodeMember],
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let limit = inner.next_members_limit;
        let group = inner.call("mgrp_get_next_node_members", dev)?.group(mgrp)?;
        let pos = group
            .nodes
            .iter()
            .position(|m| m.handle == after)
            .ok_or_else(|| DriverError::invalid_parameter(format!("{:?} not a member", after)))?;
        fill_next(&group.nodes[pos + 1..], out, NodeMember::sentinel(), limit);
        Ok(())
    }

    fn mgrp_get_first_ecmp_member(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<EcmpMember> {
        let mut inner = self.inner.lock();
        let group = inner.call("mgrp_get_first_ecmp_member", dev)?.group(mgrp)?;
        group
            .ecmps
            .first()
            .copied()
            .ok_or_else(|| DriverError::not_found("ECMP member"))
    }

    fn mgrp_get_ecmp_member_count(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
    ) -> DriverResult<u32> {
        let mut inner = self.inner.lock();
        let group = inner.call("mgrp_get_ecmp_member_count", dev)?.group(mgrp)?;
        Ok(group.ecmps.len() as u32)
    }

    fn mgrp_get_next_ecmp_members(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        after: EcmpHdl,
        out: &mut [EcmpMember],
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let limit = inner.next_members_limit;
        let group = inner.call("mgrp_get_next_ecmp_members", dev)?.group(mgrp)?;
        let pos = group
            .ecmps
            .iter()
            .position(|m| m.handle == after)
            .ok_or_else(|| DriverError::invalid_parameter(format!("{:?} not a member", after)))?;
        fill_next(&group.ecmps[pos + 1..], out, EcmpMember::sentinel(), limit);
        Ok(())
    }

    fn mgrp_get_count(&self, _sess: SessionHandle, dev: DevId) -> DriverResult<u32> {
        let mut inner = self.inner.lock();
        Ok(inner.call("mgrp_get_count", dev)?.mgrps.len() as u32)
    }
}

impl NodeApi for SimDriver {
    fn node_create(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        attr: &NodeAttr,
    ) -> DriverResult<NodeHdl> {
        let mut inner = self.inner.lock();
        inner.call("node_create", dev)?;
        let raw = inner.allocate();
        inner.device(dev)?.nodes.insert(raw, *attr);
        Ok(NodeHdl::from_raw_unchecked(raw))
    }

    fn node_destroy(&self, _sess: SessionHandle, dev: DevId, node: NodeHdl) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("node_destroy", dev)?;
        device.check_node(node)?;
        if device.node_in_use(node) {
            return Err(DriverError::object_in_use(format!("{:?}", node)));
        }
        device.nodes.remove(&node.as_raw());
        Ok(())
    }

    fn node_get_attr(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        node: NodeHdl,
    ) -> DriverResult<NodeAttr> {
        let mut inner = self.inner.lock();
        inner
            .call("node_get_attr", dev)?
            .nodes
            .get(&node.as_raw())
            .copied()
            .ok_or_else(|| DriverError::invalid_parameter(format!("unknown node {:?}", node)))
    }

    fn node_set_attr(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        node: NodeHdl,
        attr: &NodeAttr,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let slot = inner
            .call("node_set_attr", dev)?
            .nodes
            .get_mut(&node.as_raw())
            .ok_or_else(|| DriverError::invalid_parameter(format!("unknown node {:?}", node)))?;
        *slot = *attr;
        Ok(())
    }

    fn node_get_count(&self, _sess: SessionHandle, dev: DevId) -> DriverResult<u32> {
        let mut inner = self.inner.lock();
        Ok(inner.call("node_get_count", dev)?.nodes.len() as u32)
    }
}

impl EcmpApi for SimDriver {
    fn ecmp_create(&self, _sess: SessionHandle, dev: DevId) -> DriverResult<EcmpHdl> {
        let mut inner = self.inner.lock();
        inner.call("ecmp_create", dev)?;
        let raw = inner.allocate();
        inner.device(dev)?.ecmps.insert(raw, Vec::new());
        Ok(EcmpHdl::from_raw_unchecked(raw))
    }

    fn ecmp_destroy(&self, _sess: SessionHandle, dev: DevId, ecmp: EcmpHdl) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("ecmp_destroy", dev)?;
        device.ecmp(ecmp)?;
        if device.ecmp_in_use(ecmp) {
            return Err(DriverError::object_in_use(format!("{:?}", ecmp)));
        }
        device.ecmps.remove(&ecmp.as_raw());
        Ok(())
    }

    fn ecmp_member_add(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        node: NodeHdl,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("ecmp_member_add", dev)?;
        device.check_node(node)?;
        let members = device.ecmp(ecmp)?;
        if members.contains(&node) {
            return Err(DriverError::already_exists(format!("{:?} in {:?}", node, ecmp)));
        }
        members.push(node);
        Ok(())
    }

    fn ecmp_member_remove(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        node: NodeHdl,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let members = inner.call("ecmp_member_remove", dev)?.ecmp(ecmp)?;
        let pos = members
            .iter()
            .position(|n| *n == node)
            .ok_or_else(|| DriverError::not_found(format!("{:?} in {:?}", node, ecmp)))?;
        members.remove(pos);
        Ok(())
    }

    fn ecmp_member_replace(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        nodes: &[NodeHdl],
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("ecmp_member_replace", dev)?;
        for node in nodes {
            device.check_node(*node)?;
        }
        *device.ecmp(ecmp)? = nodes.to_vec();
        Ok(())
    }

    fn ecmp_get_first_member(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
    ) -> DriverResult<NodeHdl> {
        let mut inner = self.inner.lock();
        let members = inner.call("ecmp_get_first_member", dev)?.ecmp(ecmp)?;
        members
            .first()
            .copied()
            .ok_or_else(|| DriverError::not_found("ECMP member"))
    }

    fn ecmp_get_member_count(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
    ) -> DriverResult<u32> {
        let mut inner = self.inner.lock();
        let members = inner.call("ecmp_get_member_count", dev)?.ecmp(ecmp)?;
        Ok(members.len() as u32)
    }

    fn ecmp_get_next_members(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
        after: NodeHdl,
        out: &mut [NodeHdl],
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let limit = inner.next_members_limit;
        let members = inner.call("ecmp_get_next_members", dev)?.ecmp(ecmp)?;
        let pos = members
            .iter()
            .position(|n| *n == after)
            .ok_or_else(|| DriverError::invalid_parameter(format!("{:?} not a member", after)))?;
        fill_next(&members[pos + 1..], out, NodeHdl::SENTINEL, limit);
        Ok(())
    }

    fn ecmp_get_count(&self, _sess: SessionHandle, dev: DevId) -> DriverResult<u32> {
        let mut inner = self.inner.lock();
        Ok(inner.call("ecmp_get_count", dev)?.ecmps.len() as u32)
    }
}

impl LagApi for SimDriver {
    fn lag_set_membership(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        lag: LagId,
        ports: &PortMap,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("lag_set_membership", dev)?;
        if lag as usize >= LagMap::CAPACITY {
            return Err(DriverError::invalid_parameter(format!("LAG id {}", lag)));
        }
        device.lags.entry(lag).or_default().0 = *ports;
        Ok(())
    }

    fn lag_get_membership(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        lag: LagId,
    ) -> DriverResult<PortMap> {
        let mut inner = self.inner.lock();
        let device = inner.call("lag_get_membership", dev)?;
        if lag as usize >= LagMap::CAPACITY {
            return Err(DriverError::invalid_parameter(format!("LAG id {}", lag)));
        }
        Ok(device.lags.get(&lag).map(|(ports, _)| *ports).unwrap_or_default())
    }

    fn lag_set_remote_count(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        lag: LagId,
        count: RemoteLagCount,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let device = inner.call("lag_set_remote_count", dev)?;
        if lag as usize >= LagMap::CAPACITY {
            return Err(DriverError::invalid_parameter(format!("LAG id {}", lag)));
        }
        device.lags.entry(lag).or_default().1 = count;
        Ok(())
    }

    fn lag_get_remote_count(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        lag: LagId,
    ) -> DriverResult<RemoteLagCount> {
        let mut inner = self.inner.lock();
        let device = inner.call("lag_get_remote_count", dev)?;
        if lag as usize >= LagMap::CAPACITY {
            return Err(DriverError::invalid_parameter(format!("LAG id {}", lag)));
        }
        Ok(device.lags.get(&lag).map(|(_, count)| *count).unwrap_or_default())
    }
}

impl PruneApi for SimDriver {
    fn prune_set(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        l2_xid: L2Xid,
        ports: &PortMap,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.call("prune_set", dev)?.prune.insert(l2_xid, *ports);
        Ok(())
    }

    fn prune_get(&self, _sess: SessionHandle, dev: DevId, l2_xid: L2Xid) -> DriverResult<PortMap> {
        let mut inner = self.inner.lock();
        Ok(inner
            .call("prune_get", dev)?
            .prune
            .get(&l2_xid)
            .copied()
            .unwrap_or_default())
    }
}

impl PortApi for SimDriver {
    fn port_set_backup(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        backup: DevPort,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.call("port_set_backup", dev)?.port(port)?.backup = backup;
        Ok(())
    }

    fn port_get_backup(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        port: DevPort,
    ) -> DriverResult<DevPort> {
        let mut inner = self.inner.lock();
        Ok(inner.call("port_get_backup", dev)?.port(port)?.backup)
    }

    fn port_set_forward_state(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        enabled: bool,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.call("port_set_forward_state", dev)?.port(port)?.forward = enabled;
        Ok(())
    }

    fn port_get_forward_state(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        port: DevPort,
    ) -> DriverResult<bool> {
        let mut inner = self.inner.lock();
        Ok(inner.call("port_get_forward_state", dev)?.port(port)?.forward)
    }

    fn port_clear_fast_failover(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        port: DevPort,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.call("port_clear_fast_failover", dev)?.port(port)?.ff_clears += 1;
        Ok(())
    }

    fn port_set_copy_to_cpu(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        enabled: bool,
    ) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.call("port_set_copy_to_cpu", dev)?.port(port)?.copy_to_cpu = enabled;
        Ok(())
    }

    fn port_get_copy_to_cpu(
        &self,
        _sess: SessionHandle,
        dev: DevId,
        port: DevPort,
    ) -> DriverResult<bool> {
        let mut inner = self.inner.lock();
        Ok(inner.call("port_get_copy_to_cpu", dev)?.port(port)?.copy_to_cpu)
    }
}

impl SessionApi for SimDriver {
    fn begin_batch(&self, sess: SessionHandle) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.enter("begin_batch")?;
        if !inner.batches.insert(sess) {
            return Err(DriverError::from_status(PreStatus::SessionBusy));
        }
        Ok(())
    }

    fn end_batch(&self, sess: SessionHandle, _hw_sync: bool) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.enter("end_batch")?;
        if !inner.batches.remove(&sess) {
            return Err(DriverError::invalid_parameter(format!(
                "no batch open on session {}",
                sess.0
            )));
        }
        Ok(())
    }

    fn batch_in_progress(&self, sess: SessionHandle) -> bool {
        self.inner.lock().batches.contains(&sess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SESS: SessionHandle = SessionHandle(1);
    const DEV: DevId = 0;

    fn sim() -> SimDriver {
        let sim = SimDriver::new();
        sim.add_device(DEV);
        sim
    }

    fn node(sim: &SimDriver, rid: u16) -> NodeHdl {
        let attr = NodeAttr {
            rid,
            ..NodeAttr::default()
        };
        sim.node_create(SESS, DEV, &attr).unwrap()
    }

    #[test]
    fn test_unknown_device() {
        let sim = SimDriver::new();
        let err = sim.mgrp_create(SESS, 7, 1).unwrap_err();
        assert!(matches!(err, DriverError::InvalidParameter { .. }));
    }

    #[test]
    fn test_mgid_is_unique() {
        let sim = sim();
        sim.mgrp_create(SESS, DEV, 5).unwrap();
        let err = sim.mgrp_create(SESS, DEV, 5).unwrap_err();
        assert!(matches!(err, DriverError::AlreadyExists { .. }));
        assert_eq!(sim.group_count(DEV), 1);
    }

    #[test]
    fn test_group_members_in_association_order() {
        let sim = sim();
        let grp = sim.mgrp_create(SESS, DEV, 1).unwrap();
        let n1 = node(&sim, 1);
        let n2 = node(&sim, 2);
        let n3 = node(&sim, 3);
        sim.mgrp_associate_node(SESS, DEV, grp, n2, Some(9)).unwrap();
        sim.mgrp_associate_node(SESS, DEV, grp, n1, None).unwrap();
        sim.mgrp_associate_node(SESS, DEV, grp, n3, None).unwrap();

        let first = sim.mgrp_get_first_node_member(SESS, DEV, grp).unwrap();
        assert_eq!(first, NodeMember::new(n2, Some(9)));
        assert_eq!(sim.mgrp_get_node_member_count(SESS, DEV, grp).unwrap(), 3);

        let mut buf = [NodeMember::sentinel(); 4];
        sim.mgrp_get_next_node_members(SESS, DEV, grp, n2, &mut buf)
            .unwrap();
        assert_eq!(buf[0].handle, n1);
        assert_eq!(buf[1].handle, n3);
        assert!(buf[2].handle.is_sentinel());
        assert!(buf[3].handle.is_sentinel());
    }

    #[test]
    fn test_empty_group_first_member_not_found() {
        let sim = sim();
        let grp = sim.mgrp_create(SESS, DEV, 1).unwrap();
        assert!(sim
            .mgrp_get_first_node_member(SESS, DEV, grp)
            .unwrap_err()
            .is_not_found());
        assert!(sim
            .mgrp_get_first_ecmp_member(SESS, DEV, grp)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_node_in_use_cannot_be_destroyed() {
        let sim = sim();
        let grp = sim.mgrp_create(SESS, DEV, 1).unwrap();
        let n1 = node(&sim, 1);
        sim.mgrp_associate_node(SESS, DEV, grp, n1, None).unwrap();

        let err = sim.node_destroy(SESS, DEV, n1).unwrap_err();
        assert!(matches!(err, DriverError::ObjectInUse { .. }));

        sim.mgrp_destroy(SESS, DEV, grp).unwrap();
        sim.node_destroy(SESS, DEV, n1).unwrap();
        assert_eq!(sim.node_count(DEV), 0);
    }

    #[test]
    fn test_ecmp_replace_and_iterate() {
        let sim = sim();
        let ecmp = sim.ecmp_create(SESS, DEV).unwrap();
        let n1 = node(&sim, 1);
        let n2 = node(&sim, 2);
        sim.ecmp_member_add(SESS, DEV, ecmp, n1).unwrap();
        sim.ecmp_member_replace(SESS, DEV, ecmp, &[n2, n1]).unwrap();

        assert_eq!(sim.ecmp_get_first_member(SESS, DEV, ecmp).unwrap(), n2);
        let mut buf = [NodeHdl::SENTINEL; 2];
        sim.ecmp_get_next_members(SESS, DEV, ecmp, n2, &mut buf)
            .unwrap();
        assert_eq!(buf, [n1, NodeHdl::SENTINEL]);
    }

    #[test]
    fn test_next_members_limit() {
        let sim = sim();
        let ecmp = sim.ecmp_create(SESS, DEV).unwrap();
        let nodes: Vec<_> = (0..4).map(|rid| node(&sim, rid)).collect();
        sim.ecmp_member_replace(SESS, DEV, ecmp, &nodes).unwrap();
        sim.limit_next_members(Some(1));

        let mut buf = [NodeHdl::SENTINEL; 3];
        sim.ecmp_get_next_members(SESS, DEV, ecmp, nodes[0], &mut buf)
            .unwrap();
        assert_eq!(buf, [nodes[1], NodeHdl::SENTINEL, NodeHdl::SENTINEL]);
    }

    #[test]
    fn test_fault_injection() {
        let sim = sim();
        sim.fail_after("node_create", 1, PreStatus::NoMemory);
        assert!(sim.node_create(SESS, DEV, &NodeAttr::default()).is_ok());
        let err = sim.node_create(SESS, DEV, &NodeAttr::default()).unwrap_err();
        assert!(err.is_resource_exhausted());
        // One-shot faults disarm themselves.
        assert!(sim.node_create(SESS, DEV, &NodeAttr::default()).is_ok());
        assert_eq!(sim.call_count("node_create"), 3);
        assert_eq!(sim.node_count(DEV), 2);

        sim.fail_always("ecmp_create", PreStatus::HwCommFailure);
        assert!(sim.ecmp_create(SESS, DEV).is_err());
        assert!(sim.ecmp_create(SESS, DEV).is_err());
        sim.clear_faults();
        assert!(sim.ecmp_create(SESS, DEV).is_ok());
    }

    #[test]
    fn test_port_defaults() {
        let sim = sim();
        assert_eq!(sim.port_get_backup(SESS, DEV, 12).unwrap(), 12);
        assert!(sim.port_get_forward_state(SESS, DEV, 12).unwrap());
        assert!(!sim.port_get_copy_to_cpu(SESS, DEV, 12).unwrap());
        assert!(sim
            .port_get_backup(SESS, DEV, PortMap::CAPACITY as DevPort)
            .is_err());
    }

    #[test]
    fn test_batch_state() {
        let sim = sim();
        assert!(!sim.batch_in_progress(SESS));
        sim.begin_batch(SESS).unwrap();
        assert!(sim.batch_in_progress(SESS));
        assert!(sim.begin_batch(SESS).is_err());
        sim.end_batch(SESS, true).unwrap();
        assert!(sim.end_batch(SESS, true).is_err());
    }

    #[test]
    fn test_snapshot_tracks_objects() {
        let sim = sim();
        let before = sim.snapshot(DEV).unwrap();
        let grp = sim.mgrp_create(SESS, DEV, 3).unwrap();
        assert_ne!(sim.snapshot(DEV).unwrap(), before);
        sim.mgrp_destroy(SESS, DEV, grp).unwrap();
        assert_eq!(sim.snapshot(DEV).unwrap(), before);
        assert!(sim.snapshot(99).is_none());
    }
}
