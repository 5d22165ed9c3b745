//! L1 node table.

mod mgr;
mod types;

pub use mgr::NodeMgr;
pub use types::NodeData;
