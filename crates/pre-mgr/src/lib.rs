//! Resource manager for the multicast packet replication engine (PRE).
//!
//! The replication engine builds multicast trees out of three object kinds:
//! groups (MGIDs), L1 replication nodes with port and LAG fan-out, and ECMP
//! sets of nodes. Alongside them sit three dense attribute tables: LAG
//! membership, L2 exclusion (prune) and per-port attributes. This crate keeps
//! the caller's ids and the driver's handles in step for every device and
//! turns each table operation into the right sequence of driver calls.
//!
//! # Key Components
//!
//! - [`PreContext`]: driver, configuration, device registry and counters
//! - [`Directory`]: per-device bijection between caller ids and handles
//! - [`MgidMgr`], [`NodeMgr`], [`EcmpMgr`]: directory-backed managers
//! - [`LagMgr`], [`PruneMgr`], [`PortMgr`]: dense-key managers
//! - [`PreTable`]: one entry point for all six tables
//! - [`read_members`]: walks a driver member list
//!
//! # Consistency
//!
//! Every operation runs under its device's lock. A multi-step mutation that
//! fails part-way undoes the steps already taken and reports the error that
//! stopped it; failures while undoing are logged and audited, never
//! returned. Incremental modifies are the exception and keep what they
//! applied.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use pre_driver::{sim::SimDriver, SessionHandle, Target};
//! use pre_mgr::{NodeData, PreContext, PreMgrConfig, PreTable, TableData, TableKind};
//!
//! let driver = Arc::new(SimDriver::new());
//! driver.add_device(0);
//! let ctx = Arc::new(PreContext::new(driver, PreMgrConfig::default()).unwrap());
//! ctx.add_device(0).unwrap();
//!
//! let nodes = PreTable::new(TableKind::Node, Arc::clone(&ctx));
//! let sess = SessionHandle(1);
//! let entry = TableData::Node(NodeData::new(7).with_ports([3]));
//! nodes.entry_add(sess, Target::device(0), 1, &entry).unwrap();
//! assert_eq!(nodes.usage_get(sess, Target::device(0)).unwrap(), 1);
//! ```

pub mod audit;
pub mod config;
pub mod context;
pub mod directory;
pub mod ecmp;
pub mod error;
pub mod fanout;
pub mod lag;
pub mod membership;
pub mod mgid;
pub mod node;
pub mod port;
pub mod prune;
pub mod session;
pub mod state;
pub mod stats;
pub mod table;
pub mod types;

pub use audit::{try_init_logging, AuditCategory, AuditOutcome, AuditRecord};
pub use config::{ConfigError, PreMgrConfig};
pub use context::PreContext;
pub use directory::Directory;
pub use ecmp::{EcmpData, EcmpMgr};
pub use error::{DirectoryError, PreError, PreErrorKind, PreResult};
pub use lag::{LagData, LagFields, LagMgr};
pub use membership::{read_members, MemberSource};
pub use mgid::{MgidMembers, MgidMgr};
pub use node::{NodeData, NodeMgr};
pub use port::{PortData, PortFields, PortMgr};
pub use prune::{PruneData, PruneMgr};
pub use session::BatchScope;
pub use state::{DeviceRegistry, DeviceState, PreDirectories};
pub use stats::{MgrStats, TableStats};
pub use table::{PreTable, TableData};
pub use types::{ModIncFlag, ObjectId, TableKind};
