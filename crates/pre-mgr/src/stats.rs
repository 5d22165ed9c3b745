//! Per-table operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::TableKind;

#[derive(Debug, Default)]
struct TableCounters {
    created: AtomicU64,
    modified: AtomicU64,
    deleted: AtomicU64,
    failed: AtomicU64,
}

/// Counters kept by the resource manager.
#[derive(Debug, Default)]
pub struct MgrStats {
    tables: [TableCounters; 6],
    rollbacks: AtomicU64,
    rollback_failures: AtomicU64,
}

/// Point-in-time copy of one table's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub created: u64,
    pub modified: u64,
    pub deleted: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatOp {
    Create,
    Modify,
    Delete,
    Fail,
}

impl MgrStats {
    pub(crate) fn record(&self, kind: TableKind, op: StatOp) {
        let counters = &self.tables[kind.index()];
        let counter = match op {
            StatOp::Create => &counters.created,
            StatOp::Modify => &counters.modified,
            StatOp::Delete => &counters.deleted,
            StatOp::Fail => &counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self, clean: bool) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        if !clean {
            self.rollback_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn table(&self, kind: TableKind) -> TableStats {
        let counters = &self.tables[kind.index()];
        TableStats {
            created: counters.created.load(Ordering::Relaxed),
            modified: counters.modified.load(Ordering::Relaxed),
            deleted: counters.deleted.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Number of compensating sequences run after a partial failure.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Number of compensating sequences in which at least one step failed.
    pub fn rollback_failures(&self) -> u64 {
        self.rollback_failures.load(Ordering::Relaxed)
    }
}
