//! LAG membership and remote-count writes and reads.

use std::sync::Arc;

use pre_driver::{DevId, LagApi, LagId, SessionHandle, Target};
use tracing::{error, warn};

use super::types::{LagData, LagFields};
use crate::context::PreContext;
use crate::error::{DriverResultExt, PreError, PreResult};
use crate::fanout::{apply_ports, check_lag, port_list, port_map};
use crate::stats::StatOp;
use crate::types::{keys_after, ModIncFlag, ObjectId, TableKind};

const SOURCE: &str = "LagMgr";

/// Manager of the LAG table. Every LAG id in range always exists; add and
/// modify both write the supplied fields and delete writes the defaults.
///
/// Membership is written before the remote count. If the count write fails,
/// the previous membership is written back.
pub struct LagMgr {
    ctx: Arc<PreContext>,
}

impl LagMgr {
    pub fn new(ctx: Arc<PreContext>) -> Self {
        Self { ctx }
    }

    pub fn size(&self) -> u32 {
        self.ctx.config().lag_table_size
    }

    pub fn create(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &LagData,
    ) -> PreResult<()> {
        self.set(sess, target, id, data, StatOp::Create, "entry_add")
    }

    pub fn modify(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &LagData,
    ) -> PreResult<()> {
        self.set(sess, target, id, data, StatOp::Modify, "entry_mod")
    }

    /// Adds or removes the listed member ports. Remote counts have no
    /// incremental form.
    pub fn modify_incremental(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &LagData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = self.modify_incremental_locked(sess, dev, id, data, flag);
        self.ctx
            .finish(TableKind::Lag, StatOp::Modify, SOURCE, "entry_mod_inc", dev, id, result)
    }

    pub fn delete(&self, sess: SessionHandle, target: Target, id: ObjectId) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = self.set_locked(sess, dev, id, &LagData::empty(), "entry_del");
        self.ctx
            .finish(TableKind::Lag, StatOp::Delete, SOURCE, "entry_del", dev, id, result)
    }

    /// Reads the fields in `fields`. The others come back `None`.
    pub fn get(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        fields: LagFields,
    ) -> PreResult<LagData> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let lag = self.check_key(id)?;
        self.read(sess, dev, lag, fields)
    }

    pub fn get_first(
        &self,
        sess: SessionHandle,
        target: Target,
        fields: LagFields,
    ) -> PreResult<(ObjectId, LagData)> {
        Ok((0, self.get(sess, target, 0, fields)?))
    }

    pub fn get_next_n(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        n: usize,
        fields: LagFields,
    ) -> PreResult<Vec<(ObjectId, LagData)>> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        self.check_key(id)?;
        keys_after(id, n, self.size())
            .map(|key| Ok((key, self.read(sess, dev, key, fields)?)))
            .collect()
    }

    /// Declared table size; every LAG id is always in use.
    pub fn usage(&self, _sess: SessionHandle, target: Target) -> PreResult<u32> {
        self.ctx.device(target.dev_id)?;
        Ok(self.size())
    }

    pub fn clear(&self, sess: SessionHandle, target: Target) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        for id in 0..self.size() {
            let result = self.set_locked(sess, dev, id, &LagData::empty(), "clear");
            self.ctx
                .finish(TableKind::Lag, StatOp::Delete, SOURCE, "clear", dev, id, result)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn set(
        &self,
        sess: SessionHandle,
        target: Target,
        id: ObjectId,
        data: &LagData,
        op: StatOp,
        action: &'static str,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = self.set_locked(sess, dev, id, data, action);
        self.ctx.finish(TableKind::Lag, op, SOURCE, action, dev, id, result)
    }

    fn check_key(&self, id: ObjectId) -> PreResult<LagId> {
        check_lag(id, self.size())?;
        Ok(id)
    }

    fn set_locked(
        &self,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &LagData,
        action: &'static str,
    ) -> PreResult<()> {
        let lag = self.check_key(id)?;
        let ports = data
            .ports
            .as_deref()
            .map(|ports| port_map(ports, self.ctx.config().num_dev_ports))
            .transpose()?;

        let driver = self.ctx.driver();
        let Some(count) = data.remote_count else {
            if let Some(ports) = ports {
                driver
                    .lag_set_membership(sess, dev, lag, &ports)
                    .during("lag_set_membership")?;
            }
            return Ok(());
        };

        let prior = match &ports {
            Some(ports) => {
                let prior = driver
                    .lag_get_membership(sess, dev, lag)
                    .during("lag_get_membership")?;
                driver
                    .lag_set_membership(sess, dev, lag, ports)
                    .during("lag_set_membership")?;
                Some(prior)
            }
            None => None,
        };
        if let Err(err) = driver
            .lag_set_remote_count(sess, dev, lag, count)
            .during("lag_set_remote_count")
        {
            if let Some(prior) = prior {
                warn!(dev, lag, error = %err, "LAG remote count write failed, restoring membership");
                let mut failures = Vec::new();
                if let Err(e) = driver
                    .lag_set_membership(sess, dev, lag, &prior)
                    .during("lag_set_membership")
                {
                    error!(dev, lag, error = %e, "Failed to restore LAG membership");
                    failures.push(e);
                }
                self.ctx
                    .audit_rollback(TableKind::Lag, SOURCE, action, dev, id, &err, &failures);
            }
            return Err(err);
        }
        Ok(())
    }

    fn modify_incremental_locked(
        &self,
        sess: SessionHandle,
        dev: DevId,
        id: ObjectId,
        data: &LagData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        let lag = self.check_key(id)?;
        if data.remote_count.is_some() {
            return Err(PreError::invalid_arg(
                "remote LAG counts cannot be modified incrementally",
            ));
        }
        let Some(ports) = data.ports.as_deref() else {
            return Ok(());
        };

        let driver = self.ctx.driver();
        let mut map = driver
            .lag_get_membership(sess, dev, lag)
            .during("lag_get_membership")?;
        apply_ports(&mut map, ports, self.ctx.config().num_dev_ports, flag)?;
        driver
            .lag_set_membership(sess, dev, lag, &map)
            .during("lag_set_membership")
    }

    fn read(
        &self,
        sess: SessionHandle,
        dev: DevId,
        lag: LagId,
        fields: LagFields,
    ) -> PreResult<LagData> {
        let driver = self.ctx.driver();
        let mut data = LagData::default();
        if fields.contains(LagFields::PORTS) {
            let ports = driver
                .lag_get_membership(sess, dev, lag)
                .during("lag_get_membership")?;
            data.ports = Some(port_list(&ports));
        }
        if fields.contains(LagFields::REMOTE_COUNT) {
            data.remote_count = Some(
                driver
                    .lag_get_remote_count(sess, dev, lag)
                    .during("lag_get_remote_count")?,
            );
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreMgrConfig;
    use crate::error::PreErrorKind;
    use pre_driver::sim::SimDriver;
    use pre_driver::PreStatus;
    use pretty_assertions::assert_eq;

    const SESS: SessionHandle = SessionHandle(1);
    const DEV: DevId = 0;

    fn target() -> Target {
        Target::device(DEV)
    }

    fn setup() -> (Arc<SimDriver>, Arc<PreContext>, LagMgr) {
        let sim = Arc::new(SimDriver::new());
        sim.add_device(DEV);
        let ctx = Arc::new(PreContext::new(sim.clone(), PreMgrConfig::default()).unwrap());
        ctx.add_device(DEV).unwrap();
        let mgr = LagMgr::new(Arc::clone(&ctx));
        (sim, ctx, mgr)
    }

    #[test]
    fn test_set_and_get() {
        let (_sim, _ctx, mgr) = setup();
        let data = LagData::default().with_ports([4, 1]).with_remote_count(2, 3);
        mgr.create(SESS, target(), 7, &data).unwrap();
        assert_eq!(
            mgr.get(SESS, target(), 7, LagFields::all()).unwrap(),
            LagData::default().with_ports([1, 4]).with_remote_count(2, 3)
        );

        // Create on an existing key is an overwrite.
        mgr.create(SESS, target(), 7, &LagData::default().with_ports([9]))
            .unwrap();
        assert_eq!(
            mgr.get(SESS, target(), 7, LagFields::all()).unwrap(),
            LagData::default().with_ports([9]).with_remote_count(2, 3)
        );
    }

    #[test]
    fn test_inactive_fields_untouched() {
        let (sim, _ctx, mgr) = setup();
        mgr.modify(SESS, target(), 1, &LagData::default().with_remote_count(5, 6))
            .unwrap();
        assert_eq!(sim.call_count("lag_set_membership"), 0);
        assert_eq!(
            mgr.get(SESS, target(), 1, LagFields::all()).unwrap(),
            LagData::default().with_ports([]).with_remote_count(5, 6)
        );
    }

    #[test]
    fn test_key_and_port_ranges() {
        let (sim, _ctx, mgr) = setup();
        let err = mgr.create(SESS, target(), 255, &LagData::empty()).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);

        let err = mgr
            .create(SESS, target(), 1, &LagData::default().with_ports([288]))
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert_eq!(sim.total_calls(), 0);
    }

    #[test]
    fn test_modify_incremental() {
        let (_sim, _ctx, mgr) = setup();
        mgr.create(SESS, target(), 2, &LagData::default().with_ports([1, 2]))
            .unwrap();
        mgr.modify_incremental(
            SESS,
            target(),
            2,
            &LagData::default().with_ports([3]),
            ModIncFlag::Add,
        )
        .unwrap();
        mgr.modify_incremental(
            SESS,
            target(),
            2,
            &LagData::default().with_ports([1]),
            ModIncFlag::Delete,
        )
        .unwrap();
        assert_eq!(
            mgr.get(SESS, target(), 2, LagFields::all()).unwrap().ports,
            Some(vec![2, 3])
        );

        let err = mgr
            .modify_incremental(
                SESS,
                target(),
                2,
                &LagData::default().with_remote_count(1, 1),
                ModIncFlag::Add,
            )
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
    }

    #[test]
    fn test_delete_resets() {
        let (_sim, _ctx, mgr) = setup();
        mgr.create(
            SESS,
            target(),
            3,
            &LagData::default().with_ports([1]).with_remote_count(1, 2),
        )
        .unwrap();
        mgr.delete(SESS, target(), 3).unwrap();
        assert_eq!(mgr.get(SESS, target(), 3, LagFields::all()).unwrap(), LagData::empty());
    }

    #[test]
    fn test_pagination() {
        let (_sim, _ctx, mgr) = setup();
        assert_eq!(mgr.get_first(SESS, target(), LagFields::all()).unwrap(), (0, LagData::empty()));
        let keys: Vec<_> = mgr
            .get_next_n(SESS, target(), 252, 5, LagFields::all())
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![253, 254]);
        assert_eq!(mgr.usage(SESS, target()).unwrap(), 255);
    }

    #[test]
    fn test_clear_and_driver_failure() {
        let (sim, ctx, mgr) = setup();
        mgr.create(SESS, target(), 10, &LagData::default().with_ports([1]))
            .unwrap();
        mgr.clear(SESS, target()).unwrap();
        assert_eq!(mgr.get(SESS, target(), 10, LagFields::all()).unwrap(), LagData::empty());
        assert_eq!(ctx.stats().table(TableKind::Lag).deleted, 255);

        mgr.create(SESS, target(), 10, &LagData::default().with_ports([1]))
            .unwrap();
        sim.fail_next("lag_set_remote_count", PreStatus::HwCommFailure);
        let err = mgr.delete(SESS, target(), 10).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::Driver);
        assert_eq!(
            mgr.get(SESS, target(), 10, LagFields::all()).unwrap(),
            LagData::default().with_ports([1]).with_remote_count(0, 0)
        );
    }

    #[test]
    fn test_failed_count_write_restores_membership() {
        let (sim, ctx, mgr) = setup();
        let before = LagData::default().with_ports([1, 2]).with_remote_count(1, 1);
        mgr.create(SESS, target(), 3, &before).unwrap();

        sim.fail_next("lag_set_remote_count", PreStatus::HwCommFailure);
        let err = mgr
            .modify(
                SESS,
                target(),
                3,
                &LagData::default().with_ports([9]).with_remote_count(7, 7),
            )
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::Driver);
        assert_eq!(mgr.get(SESS, target(), 3, LagFields::all()).unwrap(), before);
        assert_eq!(ctx.stats().rollbacks(), 1);
        assert_eq!(ctx.stats().rollback_failures(), 0);
    }

    #[test]
    fn test_failed_membership_restore_is_counted() {
        let (sim, ctx, mgr) = setup();
        mgr.create(SESS, target(), 4, &LagData::default().with_ports([5]))
            .unwrap();
        sim.fail_after("lag_set_membership", 1, PreStatus::HwCommFailure);
        sim.fail_next("lag_set_remote_count", PreStatus::Failure);
        let err = mgr
            .modify(
                SESS,
                target(),
                4,
                &LagData::default().with_ports([6]).with_remote_count(2, 2),
            )
            .unwrap_err();
        assert!(err.to_string().contains("lag_set_remote_count"));
        assert_eq!(ctx.stats().rollback_failures(), 1);
    }

    #[test]
    fn test_only_active_fields_read() {
        let (sim, _ctx, mgr) = setup();
        sim.fail_always("lag_get_remote_count", PreStatus::NotSupported);
        mgr.create(SESS, target(), 8, &LagData::default().with_ports([3]))
            .unwrap();
        assert_eq!(
            mgr.get(SESS, target(), 8, LagFields::PORTS).unwrap(),
            LagData::default().with_ports([3])
        );
        let page = mgr
            .get_next_n(SESS, target(), 8, 2, LagFields::PORTS)
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(sim.call_count("lag_get_remote_count"), 0);

        sim.clear_faults();
        assert_eq!(
            mgr.get(SESS, target(), 8, LagFields::REMOTE_COUNT).unwrap(),
            LagData::default().with_remote_count(0, 0)
        );
        assert_eq!(sim.call_count("lag_get_membership"), 3);
    }
}
