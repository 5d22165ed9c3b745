//! Multicast group (MGID) table.
//!
//! A group is the root of a replication tree. Its branches are L1 nodes and
//! ECMP sets, each with an optional L1 exclusion id. Group lifecycle changes
//! touch several driver objects, so every mutating operation here runs as a
//! compensating sequence that leaves the directory and the driver consistent
//! on failure.

mod mgr;
mod types;

pub use mgr::MgidMgr;
pub use types::MgidMembers;
