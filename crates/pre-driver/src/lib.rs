//! Typed driver boundary for the multicast packet replication engine (PRE).
//!
//! The replication engine is programmed through a small set of primitives:
//! create and destroy objects, associate children with groups, walk member
//! lists, and set per-LAG, per-prune-entry and per-port attributes. This crate
//! expresses those primitives as traits so that the resource managers above
//! can be written against any driver, and ships [`sim::SimDriver`], an
//! in-memory model used by tests.
//!
//! # Architecture
//!
//! - [`types`]: typed handles, ids and fan-out bitmaps
//! - [`error`]: driver status codes and [`DriverError`]
//! - [`api`]: one trait per object family, combined into [`PreDriver`]
//! - [`sim`]: software model of the object store
//!
//! # Example
//!
//! ```
//! use pre_driver::{MgidApi, SessionHandle, sim::SimDriver};
//!
//! let driver = SimDriver::new();
//! driver.add_device(0);
//! let grp = driver.mgrp_create(SessionHandle(1), 0, 10).unwrap();
//! assert!(driver.group_exists(0, grp));
//! ```

pub mod api;
pub mod error;
pub mod sim;
pub mod types;

pub use api::{
    EcmpApi, EcmpMember, LagApi, MgidApi, NodeApi, NodeMember, PortApi, PreDriver, PruneApi,
    SessionApi,
};
pub use error::{DriverError, DriverResult, PreStatus};
pub use types::{
    Bitmap, DevId, DevPort, EcmpHdl, EcmpKind, GroupMember, L1Xid, L2Xid, LagId, LagMap, Mgid,
    MgidHdl, MgidKind, NodeAttr, NodeHdl, NodeKind, PipeId, PortMap, PreHandle, PreObjectKind,
    RawHandle, RemoteLagCount, Rid, SessionHandle, Target, ALL_PIPES, SENTINEL_HANDLE,
};
