//! Per-port attribute writes and reads.

use std::sync::Arc;

use pre_driver::{DevId, DevPort, PortApi, SessionHandle, Target};
use tracing::{debug, error, warn};

use super::types::{PortData, PortFields};
use crate::context::PreContext;
use crate::error::{DriverResultExt, PreError, PreResult};
use crate::fanout::check_port;
use crate::stats::StatOp;
use crate::types::{keys_after, ObjectId, TableKind};

const SOURCE: &str = "PortMgr";

/// Manager of the per-port attribute table.
///
/// Attributes are written one driver call each, in the order backup port,
/// forward state, copy-to-CPU, fast-failover clear. When a write fails, the
/// attributes already written get their previous values back. The
/// fast-failover clear cannot be undone and goes last.
pub struct PortMgr {
    ctx: Arc<PreContext>,
}

impl PortMgr {
    pub fn new(ctx: Arc<PreContext>) -> Self {
        Self { ctx }
    }

    pub fn size(&self) -> u32 {
        self.ctx.config().num_dev_ports
    }

    pub fn create(
        &self,
        sess: SessionHandle,
        target: Target,
        port: ObjectId,
        data: &PortData,
    ) -> PreResult<()> {
        self.set(sess, target, port, data, StatOp::Create, "entry_add")
    }

    pub fn modify(
        &self,
        sess: SessionHandle,
        target: Target,
        port: ObjectId,
        data: &PortData,
    ) -> PreResult<()> {
        self.set(sess, target, port, data, StatOp::Modify, "entry_mod")
    }

    /// Puts the port back to its defaults: protected by itself, forwarding
    /// and not copying to the CPU.
    pub fn delete(&self, sess: SessionHandle, target: Target, port: ObjectId) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = self.set_locked(sess, dev, port, &PortData::defaults(port), "entry_del");
        self.ctx
            .finish(TableKind::Port, StatOp::Delete, SOURCE, "entry_del", dev, port, result)
    }

    /// Reads the attributes in `fields`. The others come back `None`.
    pub fn get(
        &self,
        sess: SessionHandle,
        target: Target,
        port: ObjectId,
        fields: PortFields,
    ) -> PreResult<PortData> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let port = self.check_key(port)?;
        self.read(sess, dev, port, fields)
    }

    pub fn get_first(
        &self,
        sess: SessionHandle,
        target: Target,
        fields: PortFields,
    ) -> PreResult<(ObjectId, PortData)> {
        Ok((0, self.get(sess, target, 0, fields)?))
    }

    pub fn get_next_n(
        &self,
        sess: SessionHandle,
        target: Target,
        port: ObjectId,
        n: usize,
        fields: PortFields,
    ) -> PreResult<Vec<(ObjectId, PortData)>> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        self.check_key(port)?;
        keys_after(port, n, self.size())
            .map(|key| Ok((key, self.read(sess, dev, key, fields)?)))
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
        for port in 0..self.size() {
            let result = self.set_locked(sess, dev, port, &PortData::defaults(port), "clear");
            self.ctx
                .finish(TableKind::Port, StatOp::Delete, SOURCE, "clear", dev, port, result)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn set(
        &self,
        sess: SessionHandle,
        target: Target,
        port: ObjectId,
        data: &PortData,
        op: StatOp,
        action: &'static str,
    ) -> PreResult<()> {
        let dev = target.dev_id;
        let device = self.ctx.device(dev)?;
        let _dirs = device.lock();
        let result = self.set_locked(sess, dev, port, data, action);
        self.ctx.finish(TableKind::Port, op, SOURCE, action, dev, port, result)
    }

    fn check_key(&self, port: ObjectId) -> PreResult<DevPort> {
        check_port(port, self.size())?;
        Ok(port)
    }

    fn set_locked(
        &self,
        sess: SessionHandle,
        dev: DevId,
        port: ObjectId,
        data: &PortData,
        action: &'static str,
    ) -> PreResult<()> {
        let port = self.check_key(port)?;
        if let Some(backup) = data.backup_port {
            check_port(backup, self.size())?;
        }

        // A single write either lands or leaves the port as it was.
        let prior = if data.write_count() > 1 {
            self.read(sess, dev, port, data.fields())?
        } else {
            PortData::default()
        };

        let mut undo = PortData::default();
        if let Err(err) = self.write(sess, dev, port, data, &prior, &mut undo) {
            if undo != PortData::default() {
                warn!(dev, port, error = %err, "Port write failed, restoring previous attributes");
                let failures = self.restore(sess, dev, port, &undo);
                self.ctx
                    .audit_rollback(TableKind::Port, SOURCE, action, dev, port, &err, &failures);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Writes the active attributes, recording in `undo` the previous value
    /// of each one written.
    fn write(
        &self,
        sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        data: &PortData,
        prior: &PortData,
        undo: &mut PortData,
    ) -> PreResult<()> {
        let driver = self.ctx.driver();
        if let Some(backup) = data.backup_port {
            driver
                .port_set_backup(sess, dev, port, backup)
                .during("port_set_backup")?;
            undo.backup_port = prior.backup_port;
        }
        if let Some(enabled) = data.forward {
            driver
                .port_set_forward_state(sess, dev, port, enabled)
                .during("port_set_forward_state")?;
            undo.forward = prior.forward;
        }
        if let Some(enabled) = data.copy_to_cpu {
            driver
                .port_set_copy_to_cpu(sess, dev, port, enabled)
                .during("port_set_copy_to_cpu")?;
            undo.copy_to_cpu = prior.copy_to_cpu;
        }
        if data.clear_fast_failover == Some(true) {
            debug!(dev, port, "Clearing fast-failover state");
            driver
                .port_clear_fast_failover(sess, dev, port)
                .during("port_clear_fast_failover")?;
        }
        Ok(())
    }

    /// Writes back the attributes in `undo`, newest first. Returns the
    /// writes that failed.
    fn restore(
        &self,
        sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        undo: &PortData,
    ) -> Vec<PreError> {
        let driver = self.ctx.driver();
        let mut failures = Vec::new();
        if let Some(enabled) = undo.copy_to_cpu {
            if let Err(e) = driver
                .port_set_copy_to_cpu(sess, dev, port, enabled)
                .during("port_set_copy_to_cpu")
            {
                failures.push(e);
            }
        }
        if let Some(enabled) = undo.forward {
            if let Err(e) = driver
                .port_set_forward_state(sess, dev, port, enabled)
                .during("port_set_forward_state")
            {
                failures.push(e);
            }
        }
        if let Some(backup) = undo.backup_port {
            if let Err(e) = driver
                .port_set_backup(sess, dev, port, backup)
                .during("port_set_backup")
            {
                failures.push(e);
            }
        }
        for e in &failures {
            error!(dev, port, error = %e, "Failed to restore port attribute");
        }
        failures
    }

    fn read(
        &self,
        sess: SessionHandle,
        dev: DevId,
        port: DevPort,
        fields: PortFields,
    ) -> PreResult<PortData> {
        let driver = self.ctx.driver();
        let mut data = PortData::default();
        if fields.contains(PortFields::BACKUP_PORT) {
            data.backup_port = Some(
                driver
                    .port_get_backup(sess, dev, port)
                    .during("port_get_backup")?,
            );
        }
        if fields.contains(PortFields::FORWARD) {
            data.forward = Some(
                driver
                    .port_get_forward_state(sess, dev, port)
                    .during("port_get_forward_state")?,
            );
        }
        if fields.contains(PortFields::COPY_TO_CPU) {
            data.copy_to_cpu = Some(
                driver
                    .port_get_copy_to_cpu(sess, dev, port)
                    .during("port_get_copy_to_cpu")?,
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

    fn setup() -> (Arc<SimDriver>, Arc<PreContext>, PortMgr) {
        let sim = Arc::new(SimDriver::new());
        sim.add_device(DEV);
        let ctx = Arc::new(PreContext::new(sim.clone(), PreMgrConfig::default()).unwrap());
        ctx.add_device(DEV).unwrap();
        let mgr = PortMgr::new(Arc::clone(&ctx));
        (sim, ctx, mgr)
    }

    #[test]
    fn test_unconfigured_port_reads_defaults() {
        let (_sim, _ctx, mgr) = setup();
        assert_eq!(
            mgr.get(SESS, target(), 12, PortFields::all()).unwrap(),
            PortData::defaults(12)
        );
    }

    #[test]
    fn test_only_active_fields_written() {
        let (sim, _ctx, mgr) = setup();
        mgr.modify(SESS, target(), 4, &PortData::default().with_forward(false))
            .unwrap();
        assert_eq!(sim.call_count("port_set_forward_state"), 1);
        assert_eq!(sim.call_count("port_set_backup"), 0);
        assert_eq!(sim.call_count("port_set_copy_to_cpu"), 0);
        assert_eq!(
            mgr.get(SESS, target(), 4, PortFields::all()).unwrap(),
            PortData::defaults(4).with_forward(false)
        );
    }

    #[test]
    fn test_only_active_fields_read() {
        let (sim, _ctx, mgr) = setup();
        sim.fail_always("port_get_backup", PreStatus::NotSupported);
        sim.fail_always("port_get_copy_to_cpu", PreStatus::NotSupported);

        let data = mgr.get(SESS, target(), 4, PortFields::FORWARD).unwrap();
        assert_eq!(data, PortData::default().with_forward(true));
        assert_eq!(sim.call_count("port_get_forward_state"), 1);
        assert_eq!(sim.call_count("port_get_backup"), 0);
        assert_eq!(sim.call_count("port_get_copy_to_cpu"), 0);

        let page = mgr
            .get_next_n(SESS, target(), 0, 3, PortFields::FORWARD)
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(sim.call_count("port_get_backup"), 0);

        let err = mgr.get(SESS, target(), 4, PortFields::BACKUP_PORT).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::Driver);
    }

    #[test]
    fn test_clear_fast_failover_is_write_only() {
        let (sim, _ctx, mgr) = setup();
        mgr.create(
            SESS,
            target(),
            9,
            &PortData::default().with_backup_port(10).with_clear_fast_failover(),
        )
        .unwrap();
        assert_eq!(sim.fast_failover_clears(DEV, 9), 1);
        let data = mgr.get(SESS, target(), 9, PortFields::all()).unwrap();
        assert_eq!(data.backup_port, Some(10));
        assert_eq!(data.clear_fast_failover, None);
    }

    #[test]
    fn test_range_checks() {
        let (sim, _ctx, mgr) = setup();
        let err = mgr
            .create(SESS, target(), 288, &PortData::default().with_forward(true))
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        let err = mgr
            .create(SESS, target(), 1, &PortData::default().with_backup_port(400))
            .unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
        assert_eq!(sim.total_calls(), 0);
    }

    #[test]
    fn test_delete_restores_defaults() {
        let (sim, _ctx, mgr) = setup();
        let data = PortData::default()
            .with_backup_port(2)
            .with_forward(false)
            .with_copy_to_cpu(true);
        mgr.create(SESS, target(), 1, &data).unwrap();
        mgr.delete(SESS, target(), 1).unwrap();
        assert_eq!(
            mgr.get(SESS, target(), 1, PortFields::all()).unwrap(),
            PortData::defaults(1)
        );
        assert_eq!(sim.fast_failover_clears(DEV, 1), 0);
    }

    #[test]
    fn test_failed_write_restores_previous_attributes() {
        let (sim, ctx, mgr) = setup();
        mgr.create(SESS, target(), 3, &PortData::default().with_backup_port(7))
            .unwrap();

        sim.fail_next("port_set_copy_to_cpu", PreStatus::HwCommFailure);
        let data = PortData::default()
            .with_backup_port(8)
            .with_forward(false)
            .with_copy_to_cpu(true);
        let err = mgr.modify(SESS, target(), 3, &data).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::Driver);
        assert_eq!(
            mgr.get(SESS, target(), 3, PortFields::all()).unwrap(),
            PortData::defaults(3).with_backup_port(7)
        );
        assert_eq!(ctx.stats().rollbacks(), 1);
        assert_eq!(ctx.stats().rollback_failures(), 0);
    }

    #[test]
    fn test_failed_fast_failover_clear_restores_attributes() {
        let (sim, ctx, mgr) = setup();
        sim.fail_next("port_clear_fast_failover", PreStatus::HwCommFailure);
        let data = PortData::default()
            .with_forward(false)
            .with_clear_fast_failover();
        assert!(mgr.modify(SESS, target(), 5, &data).is_err());
        assert_eq!(
            mgr.get(SESS, target(), 5, PortFields::all()).unwrap(),
            PortData::defaults(5)
        );
        assert_eq!(ctx.stats().rollbacks(), 1);
    }

    #[test]
    fn test_failed_restore_is_counted_not_returned() {
        let (sim, ctx, mgr) = setup();
        // First forward write succeeds, the restoring one fails.
        sim.fail_after("port_set_forward_state", 1, PreStatus::HwCommFailure);
        sim.fail_next("port_set_copy_to_cpu", PreStatus::Failure);
        let data = PortData::default().with_forward(false).with_copy_to_cpu(true);
        let err = mgr.modify(SESS, target(), 2, &data).unwrap_err();
        assert!(err.to_string().contains("port_set_copy_to_cpu"));
        assert_eq!(ctx.stats().rollbacks(), 1);
        assert_eq!(ctx.stats().rollback_failures(), 1);
    }

    #[test]
    fn test_single_write_skips_prior_read() {
        let (sim, ctx, mgr) = setup();
        sim.fail_next("port_set_backup", PreStatus::HwCommFailure);
        assert!(mgr
            .modify(SESS, target(), 6, &PortData::default().with_backup_port(1))
            .is_err());
        assert_eq!(sim.call_count("port_get_backup"), 0);
        assert_eq!(ctx.stats().rollbacks(), 0);
    }

    #[test]
    fn test_pagination() {
        let (_sim, _ctx, mgr) = setup();
        let page = mgr
            .get_next_n(SESS, target(), 285, 10, PortFields::all())
            .unwrap();
        assert_eq!(
            page.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            vec![286, 287]
        );
        assert_eq!(mgr.usage(SESS, target()).unwrap(), 288);
    }
}
