//! L1 replication node lifecycle and fan-out edits.

use std::sync::Arc;

use pre_driver::{DevId, NodeApi, NodeAttr, NodeHdl, SessionHandle, Target};
use tracing::error;

use super::types::NodeData;
use crate::context::PreContext;
use crate::error::{DriverResultExt, PreError, PreResult};
use crate::fanout::{apply_lags, apply_ports, lag_list, lag_map, port_list, port_map};
use crate::state::PreDirectories;
use crate::stats::StatOp;
use crate::types::{ModIncFlag, ObjectId, TableKind};

const SOURCE: &str = "NodeMgr";

/// Lifecycle manager of the L1 node table.
pub struct NodeMgr {
    ctx: Arc<PreContext>,
}

impl NodeMgr {
    pub fn new(ctx: Arc<PreContext>) -> Self {
        Self { ctx }
    }

    pub fn create(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &NodeData,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        let result = self.create_locked(&mut dirs, sess, dev, id, data);
        self.ctx
            .finish(TableKind::Node, StatOp::Create, SOURCE, "entry_add", dev, id, result)
    }

    /// Rewrites the RID and both fan-out sets of node `id`.
    pub fn modify(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &NodeData,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let result = self.modify_locked(&dirs, sess, dev, id, data);
        self.ctx
            .finish(TableKind::Node, StatOp::Modify, SOURCE, "entry_mod", dev, id, result)
    }

    /// Adds or removes the ports and LAGs listed in `data`. The RID is left
    /// unchanged.
    pub fn modify_incremental(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &NodeData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let result = self.modify_incremental_locked(&dirs, sess, dev, id, data, flag);
        self.ctx
            .finish(TableKind::Node, StatOp::Modify, SOURCE, "entry_mod_inc", dev, id, result)
    }

    pub fn delete(&self, sess: SessionHandle, target: Target, id: ObjectId) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        let result = self.delete_locked(&mut dirs, sess, dev, id);
        self.ctx
            .finish(TableKind::Node, StatOp::Delete, SOURCE, "entry_del", dev, id, result)
    }

    pub fn get(&self, sess: SessionHandle, target: Target, id: ObjectId) -> PreResult<NodeData> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let node = Self::handle(&dirs, id)?;
        self.read(sess, dev, node)
    }

    pub fn get_first(&self, sess: SessionHandle, target: Target) -> PreResult<(ObjectId, NodeData)> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let (id, node) = dirs
            .node
            .first()
            .ok_or_else(|| PreError::not_found("any node entry"))?;
        Ok((id, self.read(sess, dev, node)?))
    }

    pub fn get_next_n(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        n: usize,
    ) -> PreResult<Vec<(ObjectId, NodeData)>> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let dirs = device.lock();
        let mut entries = Vec::with_capacity(n.min(dirs.node.len()));
        let mut cursor = id;
        while entries.len() < n {
            let Some((next, node)) = dirs.node.next(cursor) else {
                break;
            };
            entries.push((next, self.read(sess, dev, node)?));
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
            .node_get_count(sess, dev)
            .during("node_get_count")
    }

    pub fn clear(&self, sess: SessionHandle, target: Target) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let mut dirs = device.lock();
        for id in dirs.node.ids() {
            let result = self.delete_locked(&mut dirs, sess, dev, id);
            self.ctx
                .finish(TableKind::Node, StatOp::Delete, SOURCE, "clear", dev, id, result)?;
        }
        Ok(())
    }

    fn handle(dirs: &PreDirectories, id: ObjectId) -> PreResult<NodeHdl> {
        dirs.node
            .handle_of(id)
            .map_err(|_| PreError::not_found(format!("node {}", id)))
    }

    fn to_attr(&self, data: &NodeData) -> PreResult<NodeAttr> {
        let config = self.ctx.config();
        Ok(NodeAttr {
            rid: data.rid,
            ports: port_map(&data.ports, config.num_dev_ports)?,
            lags: lag_map(&data.lags, config.lag_table_size)?,
        })
    }

    fn read(&self, sess: SessionHandle, dev: DevId, node: NodeHdl) -> PreResult<NodeData> {
        let attr = self
            .ctx
            .driver()
            .node_get_attr(sess, dev, node)
            .during("node_get_attr")?;
        Ok(NodeData {
            rid: attr.rid,
            ports: port_list(&attr.ports),
            lags: lag_list(&attr.lags),
        })
    }

    fn create_locked(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &NodeData,
    ) -> PreResult<()> {
        if dirs.node.exists(id) {
            return Err(PreError::already_exists(format!("node {}", id)));
        }
        let attr = self.to_attr(data)?;
        let driver = self.ctx.driver();
        let node = driver.node_create(sess, dev, &attr).during("node_create")?;

        if let Err(e) = dirs.node.insert(id, node) {
            let err = PreError::from(e);
            let mut failures = Vec::new();
            if let Err(e) = driver.node_destroy(sess, dev, node).during("node_destroy") {
                error!(dev, id, error = %e, "Failed to destroy {:?} during rollback", node);
                failures.push(e);
            }
            self.ctx
                .audit_rollback(TableKind::Node, SOURCE, "entry_add", dev, id, &err, &failures);
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
        data: &NodeData,
    ) -> PreResult<()> {
        let node = Self::handle(dirs, id)?;
        let attr = self.to_attr(data)?;
        self.ctx
            .driver()
            .node_set_attr(sess, dev, node, &attr)
            .during("node_set_attr")
    }

    #[allow(clippy::too_many_arguments)]
    fn modify_incremental_locked(
        &self,
        dirs: &PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &NodeData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let node = Self::handle(dirs, id)?;
        let config = self.ctx.config();
        let driver = self.ctx.driver();
        let mut attr = driver
            .node_get_attr(sess, dev, node)
            .during("node_get_attr")?;
        apply_ports(&mut attr.ports, &data.ports, config.num_dev_ports, flag)?;
        apply_lags(&mut attr.lags, &data.lags, config.lag_table_size, flag)?;
        driver
            .node_set_attr(sess, dev, node, &attr)
            .during("node_set_attr")
    }

    fn delete_locked(
        &self,
        dirs: &mut PreDirectories,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
    ) -> PreResult<()> {
        let node = dirs
            .node
            .remove(id)
            .map_err(|_| PreError::not_found(format!("node {}", id)))?;
        if let Err(err) = self
            .ctx
            .driver()
            .node_destroy(sess, dev, node)
            .during("node_destroy")
        {
            let mut failures = Vec::new();
            if let Err(e) = dirs.node.insert(id, node) {
                error!(dev, id, error = %e, "Failed to restore directory entry for {:?}", node);
                failures.push(PreError::from(e));
            }
            self.ctx
                .audit_rollback(TableKind::Node, SOURCE, "entry_del", dev, id, &err, &failures);
            return Err(err);
        }
        Ok(())
    }
}
