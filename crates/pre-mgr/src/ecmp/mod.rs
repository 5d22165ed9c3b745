//! ECMP node-set table.
//!
//! An ECMP set groups L1 nodes of which the replication engine picks one per
//! packet. Sets are attached to multicast groups as branches.

mod mgr;
mod types;

pub use mgr::EcmpMgr;
pub use types::EcmpData;
