//! Identifiers and enums shared by every table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-visible object identifier (MGID, node id, ECMP id, LAG id, ...).
pub type ObjectId = u32;

/// Table kinds served by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Mgid,
    Node,
    Ecmp,
    Lag,
    Prune,
    Port,
}

impl TableKind {
    /// Every table kind, in declaration order.
    pub const ALL: [TableKind; 6] = [
        TableKind::Mgid,
        TableKind::Node,
        TableKind::Ecmp,
        TableKind::Lag,
        TableKind::Prune,
        TableKind::Port,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableKind::Mgid => "$pre.mgid",
            TableKind::Node => "$pre.node",
            TableKind::Ecmp => "$pre.ecmp",
            TableKind::Lag => "$pre.lag",
            TableKind::Prune => "$pre.prune",
            TableKind::Port => "$pre.port",
        };
        write!(f, "{}", s)
    }
}

/// Direction of an incremental modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModIncFlag {
    /// Add the listed members.
    Add,
    /// Remove the listed members.
    Delete,
}

impl ModIncFlag {
    pub fn is_delete(self) -> bool {
        self == ModIncFlag::Delete
    }
}

/// Keys of a dense table of `size` entries that follow `after`, at most `n`.
pub(crate) fn keys_after(after: ObjectId, n: usize, size: u32) -> impl Iterator<Item = ObjectId> {
    (after.saturating_add(1)..size).take(n)
}
