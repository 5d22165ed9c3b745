use pre_driver::{DevPort, LagId, Rid};
use serde::{Deserialize, Serialize};

/// Data of an L1 node entry: the replication id and the fan-out sets.
///
/// Read-back returns `ports` and `lags` sorted and without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub rid: Rid,
    pub ports: Vec<DevPort>,
    pub lags: Vec<LagId>,
}

impl NodeData {
    pub fn new(rid: Rid) -> Self {
        Self {
            rid,
            ..Default::default()
        }
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = DevPort>) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn with_lags(mut self, lags: impl IntoIterator<Item = LagId>) -> Self {
        self.lags.extend(lags);
        self
    }
}
