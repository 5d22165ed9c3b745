//! Per-port replication attributes, keyed by device port.

mod mgr;
mod types;

pub use mgr::PortMgr;
pub use types::{PortData, PortFields};
