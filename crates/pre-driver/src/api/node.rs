//! L1 node primitives.

use crate::error::DriverResult;
use crate::types::{DevId, NodeAttr, NodeHdl, SessionHandle};

/// Driver primitives for L1 replication nodes.
pub trait NodeApi: Send + Sync {
    /// Allocates a node with the given RID and fan-out.
    fn node_create(&self, sess: SessionHandle, dev: DevId, attr: &NodeAttr)
        -> DriverResult<NodeHdl>;

    /// Releases a node. Fails while the node is still a group or ECMP member.
    fn node_destroy(&self, sess: SessionHandle, dev: DevId, node: NodeHdl) -> DriverResult<()>;

    /// Reads RID and fan-out of a node.
    fn node_get_attr(&self, sess: SessionHandle, dev: DevId, node: NodeHdl)
        -> DriverResult<NodeAttr>;

    /// Rewrites RID and fan-out of a node in place.
    fn node_set_attr(
        &self,
        sess: SessionHandle,
        dev: DevId,
        node: NodeHdl,
        attr: &NodeAttr,
    ) -> DriverResult<()>;

    /// Number of live nodes on the device.
    fn node_get_count(&self, sess: SessionHandle, dev: DevId) -> DriverResult<u32>;
}
