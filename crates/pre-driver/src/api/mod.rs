//! Driver traits for the PRE object store.
//!
//! Each submodule describes one category of driver primitives. A hardware
//! driver implements every trait; [`PreDriver`] is the umbrella bound the
//! resource managers hold.
//!
//! # Available API Modules
//!
//! - [`mgid`]: multicast group objects and their node/ECMP associations
//! - [`node`]: L1 replication nodes
//! - [`ecmp`]: ECMP node sets
//! - [`lag`]: LAG port membership and remote counts
//! - [`prune`]: L2 exclusion (port pruning) table
//! - [`port`]: per-port protection, forwarding and CPU-copy attributes
//! - [`session`]: batching around a sequence of driver calls

pub mod ecmp;
pub mod lag;
pub mod mgid;
pub mod node;
pub mod port;
pub mod prune;
pub mod session;

pub use ecmp::EcmpApi;
pub use lag::LagApi;
pub use mgid::{EcmpMember, MgidApi, NodeMember};
pub use node::NodeApi;
pub use port::PortApi;
pub use prune::PruneApi;
pub use session::SessionApi;

/// Every primitive the resource managers consume.
pub trait PreDriver:
    MgidApi + NodeApi + EcmpApi + LagApi + PruneApi + PortApi + SessionApi
{
}

impl<T> PreDriver for T where
    T: MgidApi + NodeApi + EcmpApi + LagApi + PruneApi + PortApi + SessionApi
{
}
