//! L2 exclusion (prune) port sets.

use std::sync::Arc;

use pre_driver::{DevId, L2Xid, PortMap, PruneApi, SessionHandle, Target};

use super::types::PruneData;
use crate::context::PreContext;
use crate::error::{DriverResultExt, PreError, PreResult};
use crate::fanout::{apply_ports, port_list, port_map};
use crate::stats::StatOp;
use crate::types::{keys_after, ModIncFlag, ObjectId, TableKind};

const SOURCE: &str = "PruneMgr";

/// Manager of the prune table, keyed by L2 exclusion id.
pub struct PruneMgr {
    ctx: Arc<PreContext>,
}

impl PruneMgr {
    pub fn new(ctx: Arc<PreContext>) -> Self {
        Self { ctx }
    }

    pub fn size(&self) -> u32 {
        self.ctx.config().prune_table_size
    }

    pub fn create(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &PruneData,
    ) -> PreResult<()> {
        self.set(sess, target, id, data, StatOp::Create, "entry_add")
    }

    pub fn modify(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &PruneData,
    ) -> PreResult<()> {
        self.set(sess, target, id, data, StatOp::Modify, "entry_mod")
    }

    pub fn modify_incremental(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &PruneData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = self.modify_incremental_locked(sess, dev, id, data, flag);
        self.ctx
            .finish(TableKind::Prune, StatOp::Modify, SOURCE, "entry_mod_inc", dev, id, result)
    }

    pub fn delete(&self, sess: SessionHandle, target: Target, id: ObjectId) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = self.write(sess, dev, id, &PortMap::new());
        self.ctx
            .finish(TableKind::Prune, StatOp::Delete, SOURCE, "entry_del", dev, id, result)
    }

    pub fn get(&self, sess: SessionHandle, target: Target, id: ObjectId) -> PreResult<PruneData> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        self.read(sess, dev, self.check_key(id)?)
    }

    pub fn get_first(
        &self,
        sess: SessionHandle,
        target: Target,
    ) -> PreResult<(ObjectId, PruneData)> {
        Ok((0, self.get(sess, target, 0)?))
    }

    pub fn get_next_n(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        n: usize,
    ) -> PreResult<Vec<(ObjectId, PruneData)>> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        self.check_key(id)?;
        keys_after(id, n, self.size())
            .map(|key| Ok((key, self.read(sess, dev, key)?)))
            .collect()
    }

    pub fn usage(&self, _sess: SessionHandle, target: Target) -> PreResult<u32> {
        self.ctx.device(target.dev_id)?;
        Ok(self.size())
    }

    pub fn clear(&self, sess: SessionHandle, target: Target) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        for id in 0..self.size() {
            let result = self.write(sess, dev, id, &PortMap::new());
            self.ctx
                .finish(TableKind::Prune, StatOp::Delete, SOURCE, "clear", dev, id, result)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn set(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &PruneData,
        op: StatOp,
        action: &'static str,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = match data.ports.as_deref() {
            Some(ports) => port_map(ports, self.ctx.config().num_dev_ports)
                .and_then(|map| self.write(sess, dev, id, &map)),
            None => self.check_key(id).map(|_| ()),
        };
        self.ctx.finish(TableKind::Prune, op, SOURCE, action, dev, id, result)
    }

    fn check_key(&self, id: ObjectId) -> PreResult<L2Xid> {
        let size = self.size();
        if id >= size {
            return Err(PreError::invalid_arg(format!(
                "L2 exclusion id {} out of range 0..{}",
                id, size
            )));
        }
        Ok(id)
    }

    fn modify_incremental_locked(
        &self,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &PruneData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let l2_xid = self.check_key(id)?;
        let Some(ports) = data.ports.as_deref() else {
            return Ok(());
        };
        let mut map = self
            .ctx
            .driver()
            .prune_get(sess, dev, l2_xid)
            .during("prune_get")?;
        apply_ports(&mut map, ports, self.ctx.config().num_dev_ports, flag)?;
        self.write(sess, dev, l2_xid, &map)
    }

    fn write(&self, sess: SessionHandle, dev: DevId, id: ObjectId, ports: &PortMap) -> PreResult<()> {
        let l2_xid = self.check_key(id)?;
        self.ctx
            .driver()
            .prune_set(sess, dev, l2_xid, ports)
            .during("prune_set")
    }

    fn read(&self, sess: SessionHandle, dev: DevId, l2_xid: L2Xid) -> PreResult<PruneData> {
        let map = self
            .ctx
            .driver()
            .prune_get(sess, dev, l2_xid)
            .during("prune_get")?;
        Ok(PruneData {
            ports: Some(port_list(&map)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreMgrConfig;
    use crate::error::PreErrorKind;
    use pre_driver::sim::SimDriver;
    use pretty_assertions::assert_eq;

    const SESS: SessionHandle = SessionHandle(1);
    const DEV: DevId = 0;

    fn target() -> Target {
        Target::device(DEV)
    }

    fn setup() -> (Arc<SimDriver>, PruneMgr) {
        let sim = Arc::new(SimDriver::new());
        sim.add_device(DEV);
        let config = PreMgrConfig {
            prune_table_size: 16,
            ..Default::default()
        };
        let ctx = Arc::new(PreContext::new(sim.clone(), config).unwrap());
        ctx.add_device(DEV).unwrap();
        (sim, PruneMgr::new(ctx))
    }

    #[test]
    fn test_set_get_delete() {
        let (_sim, mgr) = setup();
        mgr.create(SESS, target(), 5, &PruneData::new([7, 3])).unwrap();
        assert_eq!(mgr.get(SESS, target(), 5).unwrap(), PruneData::new([3, 7]));

        mgr.modify(SESS, target(), 5, &PruneData::new([1])).unwrap();
        assert_eq!(mgr.get(SESS, target(), 5).unwrap(), PruneData::new([1]));

        mgr.delete(SESS, target(), 5).unwrap();
        assert_eq!(mgr.get(SESS, target(), 5).unwrap(), PruneData::new([]));
    }

    #[test]
    fn test_absent_ports_is_noop() {
        let (sim, mgr) = setup();
        mgr.modify(SESS, target(), 5, &PruneData::default()).unwrap();
        assert_eq!(sim.call_count("prune_set"), 0);
    }

    #[test]
    fn test_range_checks() {
        let (sim, mgr) = setup();
        let err = mgr.create(SESS, target(), 16, &PruneData::new([1])).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        let err = mgr.get(SESS, target(), 16).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        let err = mgr.create(SESS, target(), 1, &PruneData::new([300])).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert_eq!(sim.call_count("prune_set"), 0);
    }

    #[test]
    fn test_modify_incremental() {
        let (_sim, mgr) = setup();
        mgr.create(SESS, target(), 2, &PruneData::new([1, 2])).unwrap();
        mgr.modify_incremental(SESS, target(), 2, &PruneData::new([5]), ModIncFlag::Add)
            .unwrap();
        mgr.modify_incremental(SESS, target(), 2, &PruneData::new([2]), ModIncFlag::Delete)
            .unwrap();
        assert_eq!(mgr.get(SESS, target(), 2).unwrap(), PruneData::new([1, 5]));
    }

    #[test]
    fn test_pagination_and_clear() {
        let (_sim, mgr) = setup();
        mgr.create(SESS, target(), 15, &PruneData::new([4])).unwrap();
        let page = mgr.get_next_n(SESS, target(), 13, 10).unwrap();
        assert_eq!(
            page,
            vec![(14, PruneData::new([])), (15, PruneData::new([4]))]
        );
        assert_eq!(mgr.usage(SESS, target()).unwrap(), 16);

        mgr.clear(SESS, target()).unwrap();
        assert_eq!(mgr.get(SESS, target(), 15).unwrap(), PruneData::new([]));
    }
}
