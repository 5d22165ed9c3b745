//! ECMP set lifecycle and member edits.

use std::sync::Arc;

use pre_driver::{DevId, EcmpApi, EcmpHdl, NodeHdl, SessionHandle, Target};
use tracing::{error, warn};

use super::types::EcmpData;
use crate::context::PreContext;
use crate::error::{DriverResultExt, PreError, PreResult};
use crate::membership::{read_members, resolve_id, EcmpNodes};
use crate::state::PreDirectories;
use crate::stats::StatOp;
use crate::types::{ModIncFlag, ObjectId, TableKind};

const SOURCE: &str = "EcmpMgr";

/// Lifecycle manager of the ECMP table.
pub struct EcmpMgr {
    ctx: Arc<PreContext>,
}

impl EcmpMgr {
    pub fn new(ctx: Arc<PreContext>) -> Self {
        Self { ctx }
    }

    /// Creates ECMP set `id` with the listed nodes. Every node must exist;
    /// if adding a member fails the hardware set is destroyed again.
    pub fn create(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &EcmpData,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        let result = self.create_locked(&mut dirs, sess, dev, id, data);
        self.ctx
            .finish(TableKind::Ecmp, StatOp::Create, SOURCE, "entry_add", dev, id, result)
    }

    /// Replaces the member list of set `id` in one driver call.
    pub fn modify(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &EcmpData,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let result = self.modify_locked(&dirs, sess, dev, id, data);
        self.ctx
            .finish(TableKind::Ecmp, StatOp::Modify, SOURCE, "entry_mod", dev, id, result)
    }

    /// Adds or removes the listed members one by one. Members applied before
    /// a failure stay applied.
    pub fn modify_incremental(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &EcmpData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let result = self.modify_incremental_locked(&dirs, sess, dev, id, data, flag);
        self.ctx
            .finish(TableKind::Ecmp, StatOp::Modify, SOURCE, "entry_mod_inc", dev, id, result)
    }

    pub fn delete(&self, sess: SessionHandle, target: Target, id: ObjectId) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        let result = self.delete_locked(&mut dirs, sess, dev, id);
        self.ctx
            .finish(TableKind::Ecmp, StatOp::Delete, SOURCE, "entry_del", dev, id, result)
    }

    pub fn get(&self, sess: SessionHandle, target: Target, id: ObjectId) -> PreResult<EcmpData> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let ecmp = Self::handle(&dirs, id)?;
        self.read(&dirs, sess, dev, ecmp)
    }

    pub fn get_first(&self, sess: SessionHandle, target: Target) -> PreResult<(ObjectId, EcmpData)> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let (id, ecmp) = dirs
            .ecmp
            .first()
            .ok_or_else(|| PreError::not_found("any ECMP entry"))?;
        Ok((id, self.read(&dirs, sess, dev, ecmp)?))
    }

    pub fn get_next_n(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        n: usize,
    ) -> PreResult<Vec<(ObjectId, EcmpData)>> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let mut entries = Vec::with_capacity(n.min(dirs.ecmp.len()));
        let mut cursor = id;
        while entries.len() < n {
            let Some((next, ecmp)) = dirs.ecmp.next(cursor) else {
                break;
            };
            entries.push((next, self.read(&dirs, sess, dev, ecmp)?));
            cursor = next;
        }
        Ok(entries)
    }

    pub fn usage(&self, sess: SessionHandle, target: Target) -> PreResult<u32> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        self.ctx
            .driver()
            .ecmp_get_count(sess, dev)
            .during("ecmp_get_count")
    }

    pub fn clear(&self, sess: SessionHandle, target: Target) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        for id in dirs.ecmp.ids() {
            let result = self.delete_locked(&mut dirs, sess, dev, id);
            self.ctx
                .finish(TableKind::Ecmp, StatOp::Delete, SOURCE, "clear", dev, id, result)?;
        }
        Ok(())
    }

    fn handle(dirs: &PreDirectories, id: ObjectId) -> PreResult<EcmpHdl> {
        dirs.ecmp
            .handle_of(id)
            .map_err(|_| PreError::not_found(format!("ECMP {}", id)))
    }

    fn read(
        &self,
        dirs: &PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        ecmp: EcmpHdl,
    ) -> PreResult<EcmpData> {
        let members = read_members(&EcmpNodes {
            driver: self.ctx.driver(),
            sess,
            dev,
            ecmp,
        })?;
        let node_ids = members
            .into_iter()
            .map(|node| resolve_id(&dirs.node, node))
            .collect::<PreResult<Vec<_>>>()?;
        Ok(EcmpData { node_ids })
    }

    fn create_locked(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &EcmpData,
    ) -> PreResult<()> {
        if dirs.ecmp.exists(id) {
            return Err(PreError::already_exists(format!("ECMP {}", id)));
        }
        let nodes = resolve_nodes(dirs, &data.node_ids, |node_id| {
            PreError::invalid_arg(format!("node {} does not exist", node_id))
        })?;

        let driver = self.ctx.driver();
        let ecmp = driver.ecmp_create(sess, dev).during("ecmp_create")?;

        let populated = nodes
            .iter()
            .try_for_each(|node| {
                driver
                    .ecmp_member_add(sess, dev, ecmp, *node)
                    .during("ecmp_member_add")
            })
            .and_then(|()| dirs.ecmp.insert(id, ecmp).map_err(PreError::from));
        if let Err(err) = populated {
            warn!(dev, id, error = %err, "ECMP create failed, destroying {:?}", ecmp);
            let mut failures = Vec::new();
            if let Err(e) = driver.ecmp_destroy(sess, dev, ecmp).during("ecmp_destroy") {
                error!(dev, id, error = %e, "Failed to destroy {:?} during rollback", ecmp);
                failures.push(e);
            }
            self.ctx
                .audit_rollback(TableKind::Ecmp, SOURCE, "entry_add", dev, id, &err, &failures);
            return Err(err);
        }
        Ok(())
    }

    fn modify_locked(
        &self,
        dirs: &PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &EcmpData,
    ) -> PreResult<()> {
        let ecmp = Self::handle(dirs, id)?;
        let nodes = resolve_nodes(dirs, &data.node_ids, |node_id| {
            PreError::not_found(format!("node {}", node_id))
        })?;
        self.ctx
            .driver()
            .ecmp_member_replace(sess, dev, ecmp, &nodes)
            .during("ecmp_member_replace")
    }

    #[allow(clippy::too_many_arguments)]
    fn modify_incremental_locked(
        &self,
        dirs: &PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &EcmpData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let ecmp = Self::handle(dirs, id)?;
        let nodes = resolve_nodes(dirs, &data.node_ids, |node_id| {
            PreError::not_found(format!("node {}", node_id))
        })?;

        let driver = self.ctx.driver();
        for (applied, node) in nodes.iter().enumerate() {
            let result = match flag {
                ModIncFlag::Add => driver
                    .ecmp_member_add(sess, dev, ecmp, *node)
                    .during("ecmp_member_add"),
                ModIncFlag::Delete => driver
                    .ecmp_member_remove(sess, dev, ecmp, *node)
                    .during("ecmp_member_remove"),
            };
            if let Err(e) = result {
                if applied > 0 {
                    warn!(
                        dev,
                        id,
                        applied,
                        requested = nodes.len(),
                        error = %e,
                        "Incremental ECMP modify partially applied"
                    );
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn delete_locked(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
    ) -> PreResult<()> {
        let ecmp = dirs
            .ecmp
            .remove(id)
            .map_err(|_| PreError::not_found(format!("ECMP {}", id)))?;
        if let Err(err) = self
            .ctx
            .driver()
            .ecmp_destroy(sess, dev, ecmp)
            .during("ecmp_destroy")
        {
            let mut failures = Vec::new();
            if let Err(e) = dirs.ecmp.insert(id, ecmp) {
                error!(dev, id, error = %e, "Failed to restore directory entry for {:?}", ecmp);
                failures.push(PreError::from(e));
            }
            self.ctx
                .audit_rollback(TableKind::Ecmp, SOURCE, "entry_del", dev, id, &err, &failures);
            return Err(err);
        }
        Ok(())
    }
}

fn resolve_nodes(
    dirs: &PreDirectories,
    ids: &[ObjectId],
    missing: impl Fn(ObjectId) -> PreError,
) -> PreResult<Vec<NodeHdl>> {
    ids.iter()
        .map(|id| dirs.node.handle_of(*id).map_err(|_| missing(*id)))
        .collect()
}
