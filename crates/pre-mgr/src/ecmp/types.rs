use serde::{Deserialize, Serialize};

use crate::types::ObjectId;

/// Data of an ECMP entry: its member node ids, in driver order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcmpData {
    pub node_ids: Vec<ObjectId>,
}

impl EcmpData {
    pub fn new(node_ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            node_ids: node_ids.into_iter().collect(),
        }
    }
}
