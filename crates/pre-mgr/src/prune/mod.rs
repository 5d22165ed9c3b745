//! L2 exclusion table. Each L2 exclusion id names the ports a packet of that
//! domain must not be replicated to.

mod mgr;
mod types;

pub use mgr::PruneMgr;
pub use types::PruneData;
