use pre_driver::L1Xid;
use serde::{Deserialize, Serialize};

use crate::error::{PreError, PreResult};
use crate::types::ObjectId;

/// Branch lists of a multicast group.
///
/// Each branch kind is described by three parallel vectors: member ids, L1
/// exclusion valid flags, and L1 exclusion values. The three vectors of one
/// kind must have equal length. An exclusion value whose flag is false is
/// ignored; read-back reports it as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MgidMembers {
    pub node_ids: Vec<ObjectId>,
    pub node_l1_xid_valid: Vec<bool>,
    pub node_l1_xids: Vec<L1Xid>,
    pub ecmp_ids: Vec<ObjectId>,
    pub ecmp_l1_xid_valid: Vec<bool>,
    pub ecmp_l1_xids: Vec<L1Xid>,
}

impl MgidMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: ObjectId, l1_xid: Option<L1Xid>) -> Self {
        self.push_node(id, l1_xid);
        self
    }

    pub fn with_ecmp(mut self, id: ObjectId, l1_xid: Option<L1Xid>) -> Self {
        self.push_ecmp(id, l1_xid);
        self
    }

    pub fn push_node(&mut self, id: ObjectId, l1_xid: Option<L1Xid>) {
        self.node_ids.push(id);
        self.node_l1_xid_valid.push(l1_xid.is_some());
        self.node_l1_xids.push(l1_xid.unwrap_or(0));
    }

    pub fn push_ecmp(&mut self, id: ObjectId, l1_xid: Option<L1Xid>) {
        self.ecmp_ids.push(id);
        self.ecmp_l1_xid_valid.push(l1_xid.is_some());
        self.ecmp_l1_xids.push(l1_xid.unwrap_or(0));
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty() && self.ecmp_ids.is_empty()
    }

    /// Checks that the parallel vectors of each branch kind line up.
    pub fn validate(&self) -> PreResult<()> {
        check_lengths(
            "node",
            self.node_ids.len(),
            self.node_l1_xid_valid.len(),
            self.node_l1_xids.len(),
        )?;
        check_lengths(
            "ECMP",
            self.ecmp_ids.len(),
            self.ecmp_l1_xid_valid.len(),
            self.ecmp_l1_xids.len(),
        )
    }

    /// Node branches as (id, exclusion id). Only meaningful after `validate`.
    pub fn nodes(&self) -> impl Iterator<Item = (ObjectId, Option<L1Xid>)> + '_ {
        branches(&self.node_ids, &self.node_l1_xid_valid, &self.node_l1_xids)
    }

    /// ECMP branches as (id, exclusion id). Only meaningful after `validate`.
    pub fn ecmps(&self) -> impl Iterator<Item = (ObjectId, Option<L1Xid>)> + '_ {
        branches(&self.ecmp_ids, &self.ecmp_l1_xid_valid, &self.ecmp_l1_xids)
    }
}

fn check_lengths(kind: &str, ids: usize, valid: usize, xids: usize) -> PreResult<()> {
    if ids != valid || ids != xids {
        return Err(PreError::invalid_arg(format!(
            "{} branch lists differ in length: {} ids, {} exclusion flags, {} exclusion ids",
            kind, ids, valid, xids
        )));
    }
    Ok(())
}

fn branches<'a>(
    ids: &'a [ObjectId],
    valid: &'a [bool],
    xids: &'a [L1Xid],
) -> impl Iterator<Item = (ObjectId, Option<L1Xid>)> + 'a {
    ids.iter()
        .zip(valid)
        .zip(xids)
        .map(|((id, valid), xid)| (*id, valid.then_some(*xid)))
}
