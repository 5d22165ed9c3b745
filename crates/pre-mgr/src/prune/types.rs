use pre_driver::DevPort;
use serde::{Deserialize, Serialize};

/// Pruned ports of an L2 exclusion id. `None` leaves the entry untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneData {
    pub ports: Option<Vec<DevPort>>,
}

impl PruneData {
    pub fn new(ports: impl IntoIterator<Item = DevPort>) -> Self {
        Self {
            ports: Some(ports.into_iter().collect()),
        }
    }
}
