//! Multicast group lifecycle: create, rebuild on modify, incremental
//! branch edits and tree read-back.

use std::sync::Arc;

use pre_driver::{
    DevId, EcmpMember, GroupMember, L1Xid, Mgid, MgidApi, MgidHdl, NodeMember, PreObjectKind,
    SessionHandle, Target,
};
use tracing::{error, warn};

use super::types::MgidMembers;
use crate::context::PreContext;
use crate::directory::Directory;
use crate::error::{DriverResultExt, PreError, PreResult};
use crate::membership::{read_members, resolve_id, GroupEcmps, GroupNodes};
use crate::state::PreDirectories;
use crate::stats::StatOp;
use crate::types::{ModIncFlag, ObjectId, TableKind};

const SOURCE: &str = "MgidMgr";

/// Driver-level branches of a group, as read back before a full modify.
#[derive(Debug, Default)]
struct Branches {
    nodes: Vec<NodeMember>,
    ecmps: Vec<EcmpMember>,
}

/// Lifecycle manager of the multicast group table.
pub struct MgidMgr {
    ctx: Arc<PreContext>,
}

impl MgidMgr {
    pub fn new(ctx: Arc<PreContext>) -> Self {
        Self { ctx }
    }

    /// Number of MGIDs the table accepts.
    pub fn size(&self) -> u32 {
        self.ctx.config().max_mgid + 1
    }

    /// Creates group `mgid` with the given branches.
    ///
    /// Every branch id is resolved before the hardware group is allocated.
    /// If a later step fails, the hardware group is destroyed again and the
    /// failure of that step is returned.
    pub fn create(
        &self,
        sess: SessionHandle,
        target: Target,
        mgid: ObjectId,
        members: &MgidMembers,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        let result = self.create_locked(&mut dirs, sess, dev, mgid, members);
        self.ctx.finish(TableKind::Mgid, StatOp::Create, SOURCE, "entry_add", dev, mgid, result)
    }

    /// Deletes group `mgid`. On a driver failure the directory entry is put
    /// back and the group stays as it was.
    pub fn delete(&self, sess: SessionHandle, target: Target, mgid: ObjectId) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        let result = self.delete_locked(&mut dirs, sess, dev, mgid);
        self.ctx.finish(TableKind::Mgid, StatOp::Delete, SOURCE, "entry_del", dev, mgid, result)
    }

    /// Replaces every branch of group `mgid`.
    ///
    /// Implemented as delete followed by create. If the create fails, the
    /// previous branches are restored on a new hardware group; the group
    /// handle may therefore change even when the modify fails.
    pub fn modify(
        &self,
        sess: SessionHandle,
        target: Target,
        mgid: ObjectId,
        members: &MgidMembers,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        let result = self.modify_locked(&mut dirs, sess, dev, mgid, members);
        self.ctx.finish(TableKind::Mgid, StatOp::Modify, SOURCE, "entry_mod", dev, mgid, result)
    }

    /// Adds or removes the listed branches of group `mgid`.
    ///
    /// There is no rollback: when the node branches are applied and an ECMP
    /// branch then fails, the node changes stay in place.
    pub fn modify_incremental(
        &self,
        sess: SessionHandle,
        target: Target,
        mgid: ObjectId,
        members: &MgidMembers,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let result = self.modify_incremental_locked(&dirs, sess, dev, mgid, members, flag);
        self.ctx
            .finish(TableKind::Mgid, StatOp::Modify, SOURCE, "entry_mod_inc", dev, mgid, result)
    }

    /// Reads the branches of group `mgid` back from the driver.
    pub fn get(&self, sess: SessionHandle, target: Target, mgid: ObjectId) -> PreResult<MgidMembers> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        self.get_locked(&dirs, sess, dev, mgid)
    }

    /// Group with the lowest MGID.
    pub fn get_first(
        &self,
        sess: SessionHandle,
        target: Target,
    ) -> PreResult<(ObjectId, MgidMembers)> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let (mgid, _) = dirs
            .mgid
            .first()
            .ok_or_else(|| PreError::not_found("any MGID entry"))?;
        Ok((mgid, self.get_locked(&dirs, sess, dev, mgid)?))
    }

    /// Up to `n` groups following `mgid` in MGID order. `mgid` itself need
    /// not exist.
    pub fn get_next_n(
        &self,
        sess: SessionHandle,
        target: Target,
        mgid: ObjectId,
        n: usize,
    ) -> PreResult<Vec<(ObjectId, MgidMembers)>> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let mut entries = Vec::with_capacity(n.min(dirs.mgid.len()));
        let mut cursor = mgid;
        while entries.len() < n {
            let Some((next, _)) = dirs.mgid.next(cursor) else {
                break;
            };
            entries.push((next, self.get_locked(&dirs, sess, dev, next)?));
            cursor = next;
        }
        Ok(entries)
    }

    /// Live group count as reported by the driver.
    pub fn usage(&self, sess: SessionHandle, target: Target) -> PreResult<u32> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        self.ctx
            .driver()
            .mgrp_get_count(sess, dev)
            .during("mgrp_get_count")
    }

    /// Deletes every group in MGID order, stopping at the first failure.
    pub fn clear(&self, sess: SessionHandle, target: Target) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        for mgid in dirs.mgid.ids() {
            let result = self.delete_locked(&mut dirs, sess, dev, mgid);
            self.ctx
                .finish(TableKind::Mgid, StatOp::Delete, SOURCE, "clear", dev, mgid, result)?;
        }
        Ok(())
    }

    /// Hardware handle currently backing `mgid`.
    pub fn handle_of(&self, target: Target, mgid: ObjectId) -> PreResult<MgidHdl> {
        let device = self.ctx.device(target.dev_id)?;
        let dirs = device.lock();
        dirs.mgid.handle_of(mgid).map_err(PreError::from)
    }

    fn check_key(&self, mgid: ObjectId) -> PreResult<Mgid> {
        let max = self.ctx.config().max_mgid;
        if mgid > max {
            return Err(PreError::invalid_arg(format!(
                "MGID {} out of range 0..={}",
                mgid, max
            )));
        }
        Mgid::try_from(mgid).map_err(|_| PreError::invalid_arg(format!("MGID {}", mgid)))
    }

    fn create_locked(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        mgid: ObjectId,
        members: &MgidMembers,
    ) -> PreResult<()> {
        let hw_mgid = self.check_key(mgid)?;
        if dirs.mgid.exists(mgid) {
            return Err(PreError::already_exists(format!("MGID {}", mgid)));
        }
        members.validate()?;
        let nodes = resolve_branches(&dirs.node, members.nodes(), "node")?;
        let ecmps = resolve_branches(&dirs.ecmp, members.ecmps(), "ECMP")?;

        let mgrp = self
            .ctx
            .driver()
            .mgrp_create(sess, dev, hw_mgid)
            .during("mgrp_create")?;

        let populated = self
            .attach(sess, dev, mgrp, &nodes, &ecmps)
            .and_then(|()| dirs.mgid.insert(mgid, mgrp).map_err(PreError::from));
        if let Err(err) = populated {
            self.rollback_create(sess, dev, mgid, mgrp, &err);
            return Err(err);
        }
        Ok(())
    }

    fn attach(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        nodes: &[NodeMember],
        ecmps: &[EcmpMember],
    ) -> PreResult<()> {
        let driver = self.ctx.driver();
        for member in nodes {
            driver
                .mgrp_associate_node(sess, dev, mgrp, member.handle, member.l1_xid)
                .during("mgrp_associate_node")?;
        }
        for member in ecmps {
            driver
                .mgrp_associate_ecmp(sess, dev, mgrp, member.handle, member.l1_xid)
                .during("mgrp_associate_ecmp")?;
        }
        Ok(())
    }

    fn rollback_create(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgid: ObjectId,
        mgrp: MgidHdl,
        cause: &PreError,
    ) {
        warn!(dev, mgid, error = %cause, "Group create failed, destroying {:?}", mgrp);
        let mut failures = Vec::new();
        if let Err(e) = self
            .ctx
            .driver()
            .mgrp_destroy(sess, dev, mgrp)
            .during("mgrp_destroy")
        {
            error!(dev, mgid, error = %e, "Failed to destroy {:?} during rollback", mgrp);
            failures.push(e);
        }
        self.ctx
            .audit_rollback(TableKind::Mgid, SOURCE, "entry_add", dev, mgid, cause, &failures);
    }

    fn delete_locked(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        mgid: ObjectId,
    ) -> PreResult<()> {
        self.check_key(mgid)?;
        let mgrp = dirs
            .mgid
            .remove(mgid)
            .map_err(|_| PreError::not_found(format!("MGID {}", mgid)))?;

        if let Err(err) = self
            .ctx
            .driver()
            .mgrp_destroy(sess, dev, mgrp)
            .during("mgrp_destroy")
        {
            let mut failures = Vec::new();
            if let Err(e) = dirs.mgid.insert(mgid, mgrp) {
                error!(dev, mgid, error = %e, "Failed to restore directory entry for {:?}", mgrp);
                failures.push(PreError::from(e));
            }
            self.ctx
                .audit_rollback(TableKind::Mgid, SOURCE, "entry_del", dev, mgid, &err, &failures);
            return Err(err);
        }
        Ok(())
    }

    fn modify_locked(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        mgid: ObjectId,
        members: &MgidMembers,
    ) -> PreResult<()> {
        self.check_key(mgid)?;
        let mgrp = dirs
            .mgid
            .handle_of(mgid)
            .map_err(|_| PreError::not_found(format!("MGID {}", mgid)))?;
        members.validate()?;
        resolve_branches(&dirs.node, members.nodes(), "node")?;
        resolve_branches(&dirs.ecmp, members.ecmps(), "ECMP")?;

        let previous = self.read_branches(sess, dev, mgrp)?;

        self.delete_locked(dirs, sess, dev, mgid)?;
        if let Err(err) = self.create_locked(dirs, sess, dev, mgid, members) {
            self.restore(dirs, sess, dev, mgid, &previous, &err);
            return Err(err);
        }
        Ok(())
    }

    /// Rebuilds a group from its previous branches after a failed modify.
    /// Every step is attempted; failures are logged only.
    fn restore(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        mgid: ObjectId,
        previous: &Branches,
        cause: &PreError,
    ) {
        warn!(dev, mgid, error = %cause, "Group modify failed, restoring previous branches");
        let driver = self.ctx.driver();
        let mut failures = Vec::new();

        let created = self
            .check_key(mgid)
            .and_then(|hw_mgid| driver.mgrp_create(sess, dev, hw_mgid).during("mgrp_create"));
        match created {
            Ok(mgrp) => {
                for member in &previous.nodes {
                    if let Err(e) = driver
                        .mgrp_associate_node(sess, dev, mgrp, member.handle, member.l1_xid)
                        .during("mgrp_associate_node")
                    {
                        error!(dev, mgid, error = %e, "Failed to restore node branch {:?}", member.handle);
                        failures.push(e);
                    }
                }
                for member in &previous.ecmps {
                    if let Err(e) = driver
                        .mgrp_associate_ecmp(sess, dev, mgrp, member.handle, member.l1_xid)
                        .during("mgrp_associate_ecmp")
                    {
                        error!(dev, mgid, error = %e, "Failed to restore ECMP branch {:?}", member.handle);
                        failures.push(e);
                    }
                }
                if let Err(e) = dirs.mgid.insert(mgid, mgrp) {
                    error!(dev, mgid, error = %e, "Failed to restore directory entry");
                    failures.push(PreError::from(e));
                }
            }
            Err(e) => {
                error!(dev, mgid, error = %e, "Failed to re-create group during restore");
                failures.push(e);
            }
        }
        self.ctx
            .audit_rollback(TableKind::Mgid, SOURCE, "entry_mod", dev, mgid, cause, &failures);
    }

    #[allow(clippy::too_many_arguments)]
    fn modify_incremental_locked(
        &self,
        dirs: &PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        mgid: ObjectId,
        members: &MgidMembers,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        self.check_key(mgid)?;
        // An absent group reports AlreadyExists here, matching the driver
        // status callers of the incremental path expect.
        let mgrp = dirs.mgid.handle_of(mgid).map_err(|_| {
            PreError::already_exists(format!("no MGID {} to modify incrementally", mgid))
        })?;
        members.validate()?;
        let nodes = resolve_branches(&dirs.node, members.nodes(), "node")?;
        let ecmps = resolve_branches(&dirs.ecmp, members.ecmps(), "ECMP")?;

        let mut applied = 0;
        let result = self.apply_incremental(sess, dev, mgrp, &nodes, &ecmps, flag, &mut applied);
        if let Err(e) = &result {
            if applied > 0 {
                warn!(
                    dev,
                    mgid,
                    applied,
                    requested = nodes.len() + ecmps.len(),
                    error = %e,
                    "Incremental group modify partially applied"
                );
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_incremental(
        &self,
        sess: SessionHandle,
        dev: DevId,
        mgrp: MgidHdl,
        nodes: &[NodeMember],
        ecmps: &[EcmpMember],
        flag: ModIncFlag,
        applied: &mut usize,
    ) -> PreResult<()> {
        let driver = self.ctx.driver();
        for member in nodes {
            match flag {
                ModIncFlag::Add => driver
                    .mgrp_associate_node(sess, dev, mgrp, member.handle, member.l1_xid)
                    .during("mgrp_associate_node")?,
                ModIncFlag::Delete => driver
                    .mgrp_dissociate_node(sess, dev, mgrp, member.handle)
                    .during("mgrp_dissociate_node")?,
            }
            *applied += 1;
        }
        for member in ecmps {
            match flag {
                ModIncFlag::Add => driver
                    .mgrp_associate_ecmp(sess, dev, mgrp, member.handle, member.l1_xid)
                    .during("mgrp_associate_ecmp")?,
                ModIncFlag::Delete => driver
                    .mgrp_dissociate_ecmp(sess, dev, mgrp, member.handle)
                    .during("mgrp_dissociate_ecmp")?,
            }
            *applied += 1;
        }
        Ok(())
    }

    fn read_branches(&self, sess: SessionHandle, dev: DevId, mgrp: MgidHdl) -> PreResult<Branches> {
        let driver = self.ctx.driver();
        Ok(Branches {
            nodes: read_members(&GroupNodes {
                driver,
                sess,
                dev,
                mgrp,
            })?,
            ecmps: read_members(&GroupEcmps {
                driver,
                sess,
                dev,
                mgrp,
            })?,
        })
    }

    fn get_locked(
        &self,
        dirs: &PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        mgid: ObjectId,
    ) -> PreResult<MgidMembers> {
        self.check_key(mgid)?;
        let mgrp = dirs
            .mgid
            .handle_of(mgid)
            .map_err(|_| PreError::not_found(format!("MGID {}", mgid)))?;
        let branches = self.read_branches(sess, dev, mgrp)?;

        let mut members = MgidMembers::new();
        for member in branches.nodes {
            members.push_node(resolve_id(&dirs.node, member.handle)?, member.l1_xid);
        }
        for member in branches.ecmps {
            members.push_ecmp(resolve_id(&dirs.ecmp, member.handle)?, member.l1_xid);
        }
        Ok(members)
    }
}

/// Resolves branch ids to driver handles. A missing child is an invalid
/// argument of the group operation.
fn resolve_branches<K: PreObjectKind>(
    dir: &Directory<K>,
    branches: impl Iterator<Item = (ObjectId, Option<L1Xid>)>,
    what: &str,
) -> PreResult<Vec<GroupMember<K>>> {
    branches
        .map(|(id, l1_xid)| {
            dir.handle_of(id)
                .map(|handle| GroupMember::new(handle, l1_xid))
                .map_err(|_| PreError::invalid_arg(format!("{} {} does not exist", what, id)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreMgrConfig;
    use crate::error::PreErrorKind;
    use pre_driver::sim::SimDriver;
    use pre_driver::{EcmpApi, EcmpHdl, NodeApi, NodeAttr, NodeHdl, PreStatus};
    use pretty_assertions::assert_eq;

    const SESS: SessionHandle = SessionHandle(1);
    const DEV: DevId = 0;

    fn target() -> Target {
        Target::device(DEV)
    }

    struct Fixture {
        sim: Arc<SimDriver>,
        ctx: Arc<PreContext>,
        mgr: MgidMgr,
    }

    fn setup_with(config: PreMgrConfig) -> Fixture {
        let sim = Arc::new(SimDriver::new());
        sim.add_device(DEV);
        let ctx = Arc::new(PreContext::new(sim.clone(), config).unwrap());
        ctx.add_device(DEV).unwrap();
        let mgr = MgidMgr::new(Arc::clone(&ctx));
        Fixture { sim, ctx, mgr }
    }

    fn setup() -> Fixture {
        setup_with(PreMgrConfig::default())
    }

    impl Fixture {
        fn add_node(&self, id: ObjectId) -> NodeHdl {
            let hdl = self
                .sim
                .node_create(SESS, DEV, &NodeAttr::default())
                .unwrap();
            self.ctx.device(DEV).unwrap().lock().node.insert(id, hdl).unwrap();
            hdl
        }

        fn add_ecmp(&self, id: ObjectId) -> EcmpHdl {
            let hdl = self.sim.ecmp_create(SESS, DEV).unwrap();
            self.ctx.device(DEV).unwrap().lock().ecmp.insert(id, hdl).unwrap();
            hdl
        }

        fn exists(&self, mgid: ObjectId) -> bool {
            self.ctx.device(DEV).unwrap().lock().mgid.exists(mgid)
        }
    }

    #[test]
    fn test_create_get_delete() {
        let fx = setup();
        fx.add_node(10);
        let members = MgidMembers::new().with_node(10, None);

        fx.mgr.create(SESS, target(), 5, &members).unwrap();
        assert_eq!(fx.mgr.get(SESS, target(), 5).unwrap(), members);
        assert_eq!(fx.sim.group_count(DEV), 1);

        fx.mgr.delete(SESS, target(), 5).unwrap();
        assert!(fx.mgr.get(SESS, target(), 5).unwrap_err().is_not_found());
        assert_eq!(fx.sim.group_count(DEV), 0);
    }

    #[test]
    fn test_create_passes_mgid_to_driver() {
        let fx = setup();
        fx.mgr.create(SESS, target(), 300, &MgidMembers::new()).unwrap();
        let hdl = fx.mgr.handle_of(target(), 300).unwrap();
        assert_eq!(fx.sim.group_handle(DEV, 300), Some(hdl));
    }

    #[test]
    fn test_create_duplicate_mgid() {
        let fx = setup();
        fx.mgr.create(SESS, target(), 1, &MgidMembers::new()).unwrap();
        let calls = fx.sim.total_calls();

        let err = fx.mgr.create(SESS, target(), 1, &MgidMembers::new()).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::AlreadyExists);
        assert_eq!(fx.sim.total_calls(), calls);
    }

    #[test]
    fn test_create_mismatched_lengths_touches_no_hardware() {
        let fx = setup();
        fx.add_node(1);
        let mut members = MgidMembers::new().with_node(1, Some(2));
        members.node_l1_xid_valid.push(true);
        let calls = fx.sim.total_calls();

        let err = fx.mgr.create(SESS, target(), 9, &members).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert_eq!(fx.sim.total_calls(), calls);
        assert!(!fx.exists(9));
    }

    #[test]
    fn test_modify_mismatched_lengths_touches_no_hardware() {
        let fx = setup();
        fx.add_node(1);
        fx.add_ecmp(2);
        let original = MgidMembers::new().with_node(1, None);
        fx.mgr.create(SESS, target(), 9, &original).unwrap();

        let mut members = MgidMembers::new().with_ecmp(2, Some(4));
        members.ecmp_l1_xids.pop();
        let calls = fx.sim.total_calls();

        let err = fx.mgr.modify(SESS, target(), 9, &members).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert_eq!(fx.sim.total_calls(), calls);
        assert_eq!(fx.mgr.get(SESS, target(), 9).unwrap(), original);
    }

    #[test]
    fn test_modify_incremental_mismatched_lengths_touches_no_hardware() {
        let fx = setup();
        fx.add_node(1);
        fx.add_node(3);
        let original = MgidMembers::new().with_node(1, None);
        fx.mgr.create(SESS, target(), 9, &original).unwrap();

        let mut members = MgidMembers::new().with_node(3, None);
        members.node_l1_xids.push(7);
        let calls = fx.sim.total_calls();

        for flag in [ModIncFlag::Add, ModIncFlag::Delete] {
            let err = fx
                .mgr
                .modify_incremental(SESS, target(), 9, &members, flag)
                .unwrap_err();
            assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        }
        assert_eq!(fx.sim.total_calls(), calls);
        assert_eq!(fx.mgr.get(SESS, target(), 9).unwrap(), original);
    }

    #[test]
    fn test_create_missing_ecmp_is_invalid_arg() {
        let fx = setup();
        fx.add_node(1);
        fx.add_node(2);
        let members = MgidMembers::new()
            .with_node(1, None)
            .with_node(2, None)
            .with_ecmp(3, None);

        let err = fx.mgr.create(SESS, target(), 7, &members).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert!(!fx.exists(7));
        assert_eq!(fx.sim.call_count("mgrp_create"), 0);
    }

    #[test]
    fn test_create_rolls_back_on_ecmp_association_failure() {
        let fx = setup();
        fx.add_node(1);
        fx.add_ecmp(3);
        fx.sim.fail_next("mgrp_associate_ecmp", PreStatus::HwCommFailure);
        let members = MgidMembers::new().with_node(1, None).with_ecmp(3, None);

        let err = fx.mgr.create(SESS, target(), 7, &members).unwrap_err();
        assert!(matches!(
            err,
            PreError::Driver {
                operation: "mgrp_associate_ecmp",
                ..
            }
        ));
        assert!(!fx.exists(7));
        assert_eq!(fx.sim.group_count(DEV), 0);
        assert_eq!(fx.ctx.stats().rollbacks(), 1);
        assert_eq!(fx.ctx.stats().rollback_failures(), 0);
    }

    #[test]
    fn test_create_rollback_failure_returns_original_error() {
        let fx = setup();
        fx.add_node(1);
        fx.sim.fail_next("mgrp_associate_node", PreStatus::NoMemory);
        fx.sim.fail_next("mgrp_destroy", PreStatus::HwCommFailure);

        let err = fx
            .mgr
            .create(SESS, target(), 2, &MgidMembers::new().with_node(1, None))
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::NoResources);
        assert!(!fx.exists(2));
        assert_eq!(fx.ctx.stats().rollback_failures(), 1);
    }

    #[test]
    fn test_delete_missing() {
        let fx = setup();
        assert!(fx.mgr.delete(SESS, target(), 4).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_reinserts_on_destroy_failure() {
        let fx = setup();
        fx.add_node(1);
        let members = MgidMembers::new().with_node(1, Some(5));
        fx.mgr.create(SESS, target(), 4, &members).unwrap();
        let hdl = fx.mgr.handle_of(target(), 4).unwrap();
        fx.sim.fail_next("mgrp_destroy", PreStatus::HwCommFailure);

        let err = fx.mgr.delete(SESS, target(), 4).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::Driver);
        assert_eq!(fx.mgr.handle_of(target(), 4).unwrap(), hdl);
        assert_eq!(fx.mgr.get(SESS, target(), 4).unwrap(), members);
    }

    #[test]
    fn test_modify_replaces_members() {
        let fx = setup();
        for id in [1, 2, 3] {
            fx.add_node(id);
        }
        fx.add_ecmp(20);
        fx.mgr
            .create(SESS, target(), 8, &MgidMembers::new().with_node(1, None))
            .unwrap();

        let replacement = MgidMembers::new()
            .with_node(2, Some(11))
            .with_node(3, None)
            .with_ecmp(20, Some(4));
        fx.mgr.modify(SESS, target(), 8, &replacement).unwrap();
        assert_eq!(fx.mgr.get(SESS, target(), 8).unwrap(), replacement);
        assert_eq!(fx.sim.group_count(DEV), 1);
    }

    #[test]
    fn test_modify_restores_on_create_failure() {
        let fx = setup();
        fx.add_node(1);
        fx.add_node(2);
        fx.add_ecmp(30);
        let original = MgidMembers::new().with_node(1, Some(6)).with_ecmp(30, None);
        fx.mgr.create(SESS, target(), 8, &original).unwrap();

        // The first association of the re-create fails; the restore path's
        // associations succeed.
        fx.sim.fail_next("mgrp_associate_node", PreStatus::HwCommFailure);
        let err = fx
            .mgr
            .modify(SESS, target(), 8, &MgidMembers::new().with_node(2, None))
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::Driver);

        assert!(fx.exists(8));
        assert_eq!(fx.mgr.get(SESS, target(), 8).unwrap(), original);
        assert_eq!(fx.sim.group_count(DEV), 1);
    }

    #[test]
    fn test_modify_missing_group() {
        let fx = setup();
        let err = fx
            .mgr
            .modify(SESS, target(), 8, &MgidMembers::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_modify_missing_child_leaves_group_untouched() {
        let fx = setup();
        fx.add_node(1);
        let original = MgidMembers::new().with_node(1, None);
        fx.mgr.create(SESS, target(), 8, &original).unwrap();
        let hdl = fx.mgr.handle_of(target(), 8).unwrap();

        let err = fx
            .mgr
            .modify(SESS, target(), 8, &MgidMembers::new().with_node(99, None))
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert_eq!(fx.mgr.handle_of(target(), 8).unwrap(), hdl);
        assert_eq!(fx.mgr.get(SESS, target(), 8).unwrap(), original);
    }

    #[test]
    fn test_modify_incremental_add_and_delete() {
        let fx = setup();
        fx.add_node(1);
        fx.add_node(2);
        fx.add_ecmp(5);
        fx.mgr
            .create(SESS, target(), 3, &MgidMembers::new().with_node(1, None))
            .unwrap();

        let delta = MgidMembers::new().with_node(2, Some(9)).with_ecmp(5, None);
        fx.mgr
            .modify_incremental(SESS, target(), 3, &delta, ModIncFlag::Add)
            .unwrap();
        assert_eq!(
            fx.mgr.get(SESS, target(), 3).unwrap(),
            MgidMembers::new()
                .with_node(1, None)
                .with_node(2, Some(9))
                .with_ecmp(5, None)
        );

        fx.mgr
            .modify_incremental(SESS, target(), 3, &delta, ModIncFlag::Delete)
            .unwrap();
        assert_eq!(
            fx.mgr.get(SESS, target(), 3).unwrap(),
            MgidMembers::new().with_node(1, None)
        );
    }

    #[test]
    fn test_modify_incremental_absent_group() {
        let fx = setup();
        let err = fx
            .mgr
            .modify_incremental(SESS, target(), 3, &MgidMembers::new(), ModIncFlag::Add)
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::AlreadyExists);
    }

    #[test]
    fn test_modify_incremental_partial_apply_is_kept() {
        let fx = setup();
        fx.add_node(1);
        fx.add_ecmp(5);
        fx.mgr.create(SESS, target(), 3, &MgidMembers::new()).unwrap();
        fx.sim.fail_next("mgrp_associate_ecmp", PreStatus::HwCommFailure);

        let delta = MgidMembers::new().with_node(1, None).with_ecmp(5, None);
        assert!(fx
            .mgr
            .modify_incremental(SESS, target(), 3, &delta, ModIncFlag::Add)
            .is_err());
        assert_eq!(
            fx.mgr.get(SESS, target(), 3).unwrap(),
            MgidMembers::new().with_node(1, None)
        );
    }

    #[test]
    fn test_get_first_and_next_n() {
        let fx = setup();
        for mgid in [40, 10, 30, 20] {
            fx.mgr.create(SESS, target(), mgid, &MgidMembers::new()).unwrap();
        }

        let (first, _) = fx.mgr.get_first(SESS, target()).unwrap();
        assert_eq!(first, 10);

        let ids: Vec<_> = fx
            .mgr
            .get_next_n(SESS, target(), 10, 2)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![20, 30]);

        // Start key need not exist; the result is short at the end.
        let ids: Vec<_> = fx
            .mgr
            .get_next_n(SESS, target(), 25, 10)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![30, 40]);
    }

    #[test]
    fn test_get_first_empty_table() {
        let fx = setup();
        assert!(fx.mgr.get_first(SESS, target()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_usage_and_clear() {
        let fx = setup();
        for mgid in 0..3 {
            fx.mgr.create(SESS, target(), mgid, &MgidMembers::new()).unwrap();
        }
        assert_eq!(fx.mgr.usage(SESS, target()).unwrap(), 3);

        fx.mgr.clear(SESS, target()).unwrap();
        assert_eq!(fx.mgr.usage(SESS, target()).unwrap(), 0);
        assert!(fx.mgr.get_first(SESS, target()).is_err());
    }

    #[test]
    fn test_mgid_out_of_range() {
        let fx = setup_with(PreMgrConfig {
            max_mgid: 100,
            ..Default::default()
        });
        assert_eq!(fx.mgr.size(), 101);
        let err = fx
            .mgr
            .create(SESS, target(), 101, &MgidMembers::new())
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert!(fx.mgr.create(SESS, target(), 100, &MgidMembers::new()).is_ok());
    }

    #[test]
    fn test_unknown_device() {
        let fx = setup();
        let err = fx
            .mgr
            .create(SESS, Target::device(9), 1, &MgidMembers::new())
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
    }

    #[test]
    fn test_stats_track_outcomes() {
        let fx = setup();
        fx.mgr.create(SESS, target(), 1, &MgidMembers::new()).unwrap();
        let _ = fx.mgr.create(SESS, target(), 1, &MgidMembers::new());
        fx.mgr.delete(SESS, target(), 1).unwrap();

        let stats = fx.ctx.stats().table(TableKind::Mgid);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.failed, 1);
    }
}
