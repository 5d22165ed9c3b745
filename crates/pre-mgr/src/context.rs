//! Shared context handed to every manager.

use std::sync::Arc;

use pre_driver::{DevId, PreDriver};

use crate::audit::{AuditCategory, AuditRecord};
use crate::audit_log;
use crate::config::PreMgrConfig;
use crate::error::{PreError, PreResult};
use crate::state::{DeviceRegistry, DeviceState};
use crate::stats::{MgrStats, StatOp};
use crate::types::{ObjectId, TableKind};

/// Driver, device registry, configuration and counters of one resource
/// manager instance.
pub struct PreContext {
    driver: Arc<dyn PreDriver>,
    registry: DeviceRegistry,
    config: PreMgrConfig,
    stats: MgrStats,
}

impl std::fmt::Debug for PreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreContext")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PreContext {
    /// Creates a context. The configuration is validated first.
    pub fn new(driver: Arc<dyn PreDriver>, config: PreMgrConfig) -> PreResult<Self> {
        config
            .validate()
            .map_err(|e| PreError::invalid_arg(e.to_string()))?;
        Ok(Self {
            driver,
            registry: DeviceRegistry::new(),
            config,
            stats: MgrStats::default(),
        })
    }

    pub fn driver(&self) -> &dyn PreDriver {
        self.driver.as_ref()
    }

    pub fn config(&self) -> &PreMgrConfig {
        &self.config
    }

    pub fn stats(&self) -> &MgrStats {
        &self.stats
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Brings up the bookkeeping of a device.
    pub fn add_device(&self, dev_id: DevId) -> PreResult<()> {
        let result = self.registry.add_device(dev_id).map(|_| ());
        self.audit_device("add_device", dev_id, &result);
        result
    }

    /// Drops the bookkeeping of a device. Hardware objects are owned by the
    /// driver and are not touched.
    pub fn remove_device(&self, dev_id: DevId) -> PreResult<()> {
        let result = self.registry.remove_device(dev_id).map(|_| ());
        self.audit_device("remove_device", dev_id, &result);
        result
    }

    pub fn device(&self, dev_id: DevId) -> PreResult<Arc<DeviceState>> {
        self.registry.get(dev_id)
    }

    /// Emits `record` unless auditing is disabled.
    pub(crate) fn audit(&self, record: AuditRecord) {
        if self.config.audit_enabled {
            audit_log!(record);
        }
    }

    /// Counts and audits the outcome of a table operation, then hands the
    /// result back.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn finish<T>(
        &self,
        kind: TableKind,
        op: StatOp,
        source: &'static str,
        action: &'static str,
        dev_id: DevId,
        key: ObjectId,
        result: PreResult<T>,
    ) -> PreResult<T> {
        let category = match op {
            StatOp::Create => AuditCategory::ResourceCreate,
            StatOp::Modify => AuditCategory::ResourceModify,
            StatOp::Delete => AuditCategory::ResourceDelete,
            StatOp::Fail => AuditCategory::ErrorCondition,
        };
        let record = AuditRecord::new(category, source, action).with_entry(kind, dev_id, key);
        match &result {
            Ok(_) => {
                self.stats.record(kind, op);
                self.audit(record);
            }
            Err(e) => {
                self.stats.record(kind, StatOp::Fail);
                self.audit(record.with_error(e.to_string()));
            }
        }
        result
    }

    /// Records a compensating sequence and the steps of it that failed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn audit_rollback(
        &self,
        kind: TableKind,
        source: &'static str,
        action: &'static str,
        dev_id: DevId,
        key: ObjectId,
        cause: &PreError,
        failures: &[PreError],
    ) {
        self.stats.record_rollback(failures.is_empty());
        let record = AuditRecord::new(AuditCategory::Rollback, source, action)
            .with_entry(kind, dev_id, key)
            .with_details(serde_json::json!({
                "cause": cause.to_string(),
                "failed_steps": failures.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            }));
        let record = if failures.is_empty() {
            record
        } else {
            record.with_error(format!("{} rollback step(s) failed", failures.len()))
        };
        self.audit(record);
    }

    fn audit_device(&self, action: &str, dev_id: DevId, result: &PreResult<()>) {
        let record =
            AuditRecord::new(AuditCategory::DeviceLifecycle, "PreContext", action).with_device(dev_id);
        let record = match result {
            Ok(()) => record,
            Err(e) => record.with_error(e.to_string()),
        };
        self.audit(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreErrorKind;
    use pre_driver::sim::SimDriver;

    #[test]
    fn test_new_rejects_bad_config() {
        let config = PreMgrConfig {
            num_dev_ports: 0,
            ..Default::default()
        };
        let err = PreContext::new(Arc::new(SimDriver::new()), config).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::InvalidArg);
    }

    #[test]
    fn test_device_lifecycle() {
        let ctx = PreContext::new(Arc::new(SimDriver::new()), PreMgrConfig::default()).unwrap();
        ctx.add_device(2).unwrap();
        assert!(ctx.device(2).is_ok());
        assert_eq!(
            ctx.add_device(2).unwrap_err().kind(),
            PreErrorKind::AlreadyExists
        );
        ctx.remove_device(2).unwrap();
        assert_eq!(ctx.device(2).unwrap_err().kind(), PreErrorKind::InvalidArg);
    }
}
