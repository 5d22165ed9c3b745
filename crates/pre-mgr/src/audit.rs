//! Audit trail of PRE table changes.
//!
//! Each mutating table operation produces one [`AuditRecord`] naming the
//! table, device and key it touched. A failed multi-step operation produces
//! a second record of category [`AuditCategory::Rollback`] listing the undo
//! steps that did not go through. Records go out on the `audit` tracing
//! target via [`audit_log!`](crate::audit_log): successes at info level,
//! failures at warn level.

use chrono::{DateTime, Utc};
use pre_driver::DevId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ObjectId, TableKind};

/// What kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    ResourceCreate,
    /// Full and incremental modifies.
    ResourceModify,
    ResourceDelete,
    /// Undo of a partially applied operation.
    Rollback,
    /// An operation that failed before changing anything it reports on.
    ErrorCondition,
    DeviceLifecycle,
}

impl AuditCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditCategory::ResourceCreate => "RESOURCE_CREATE",
            AuditCategory::ResourceModify => "RESOURCE_MODIFY",
            AuditCategory::ResourceDelete => "RESOURCE_DELETE",
            AuditCategory::Rollback => "ROLLBACK",
            AuditCategory::ErrorCondition => "ERROR_CONDITION",
            AuditCategory::DeviceLifecycle => "DEVICE_LIFECYCLE",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        })
    }
}

/// One audited change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    /// Manager that made the change, e.g. "MgidMgr".
    pub manager: String,
    /// Table operation, e.g. "entry_add" or "clear".
    pub action: String,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<DevId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// A successful record stamped with the current time.
    pub fn new(
        category: AuditCategory,
        manager: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            manager: manager.into(),
            action: action.into(),
            outcome: AuditOutcome::Success,
            table: None,
            dev_id: None,
            key: None,
            details: None,
            error: None,
        }
    }

    /// Names the table entry the record is about.
    pub fn with_entry(mut self, table: TableKind, dev_id: DevId, key: ObjectId) -> Self {
        self.table = Some(table);
        self.dev_id = Some(dev_id);
        self.key = Some(key);
        self
    }

    pub fn with_device(mut self, dev_id: DevId) -> Self {
        self.dev_id = Some(dev_id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Marks the record failed with `error`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    /// `<table>[<dev>:<key>]`, or whatever part of it is known.
    pub fn subject(&self) -> String {
        let table = self.table.map(|t| t.to_string()).unwrap_or_default();
        match (self.dev_id, self.key) {
            (Some(dev), Some(key)) => format!("{}[{}:{}]", table, dev, key),
            (Some(dev), None) => format!("{}[{}]", table, dev),
            _ => table,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"audit_error":"{}"}}"#, e))
    }
}

/// Emits an [`AuditRecord`](crate::audit::AuditRecord) on the `audit`
/// tracing target.
///
/// ```
/// use pre_mgr::audit::{AuditCategory, AuditRecord};
/// use pre_mgr::{audit_log, TableKind};
///
/// audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, "NodeMgr", "entry_add")
///     .with_entry(TableKind::Node, 0, 10));
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {{
        let record: $crate::audit::AuditRecord = $record;
        match record.outcome {
            $crate::audit::AuditOutcome::Success => tracing::info!(
                target: "audit",
                category = %record.category,
                manager = %record.manager,
                audit_json = %record.to_json(),
                "AUDIT: {} {} {}",
                record.category,
                record.action,
                record.subject()
            ),
            $crate::audit::AuditOutcome::Failure => tracing::warn!(
                target: "audit",
                category = %record.category,
                manager = %record.manager,
                error = record.error.as_deref().unwrap_or_default(),
                audit_json = %record.to_json(),
                "AUDIT: {} {} {} failed",
                record.category,
                record.action,
                record.subject()
            ),
        }
    }};
}

/// Installs a test-friendly fmt subscriber filtered by `RUST_LOG`, falling
/// back to `log_level`. Returns false if a subscriber is already installed.
pub fn try_init_logging(log_level: &str) -> bool {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_test_writer())
        .try_init()
        .is_ok()
}
