//! Uniform table interface over the six managers.
//!
//! A front end that addresses tables by name hands every request to a
//! [`PreTable`]; the table checks that the payload matches its kind and
//! forwards to the manager.
//!
//! Reads take an optional template. For the LAG and port tables the fields
//! that are `Some` in the template are the ones read; without a template
//! every readable field is read. The other tables always read whole entries.

use std::sync::Arc;

use pre_driver::{SessionHandle, Target};
use serde::{Deserialize, Serialize};

use crate::context::PreContext;
use crate::ecmp::{EcmpData, EcmpMgr};
use crate::error::{PreError, PreResult};
use crate::lag::{LagData, LagFields, LagMgr};
use crate::mgid::{MgidMembers, MgidMgr};
use crate::node::{NodeData, NodeMgr};
use crate::port::{PortData, PortFields, PortMgr};
use crate::prune::{PruneData, PruneMgr};
use crate::types::{ModIncFlag, ObjectId, TableKind};

/// Entry payload of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum TableData {
    Mgid(MgidMembers),
    Node(NodeData),
    Ecmp(EcmpData),
    Lag(LagData),
    Prune(PruneData),
    Port(PortData),
}

impl TableData {
    pub fn kind(&self) -> TableKind {
        match self {
            TableData::Mgid(_) => TableKind::Mgid,
            TableData::Node(_) => TableKind::Node,
            TableData::Ecmp(_) => TableKind::Ecmp,
            TableData::Lag(_) => TableKind::Lag,
            TableData::Prune(_) => TableKind::Prune,
            TableData::Port(_) => TableKind::Port,
        }
    }
}

/// One PRE table.
pub enum PreTable {
    Mgid(MgidMgr),
    Node(NodeMgr),
    Ecmp(EcmpMgr),
    Lag(LagMgr),
    Prune(PruneMgr),
    Port(PortMgr),
}

impl PreTable {
    pub fn new(kind: TableKind, ctx: Arc<PreContext>) -> Self {
        match kind {
            TableKind::Mgid => PreTable::Mgid(MgidMgr::new(ctx)),
            TableKind::Node => PreTable::Node(NodeMgr::new(ctx)),
            TableKind::Ecmp => PreTable::Ecmp(EcmpMgr::new(ctx)),
            TableKind::Lag => PreTable::Lag(LagMgr::new(ctx)),
            TableKind::Prune => PreTable::Prune(PruneMgr::new(ctx)),
            TableKind::Port => PreTable::Port(PortMgr::new(ctx)),
        }
    }

    /// One table of every kind, in [`TableKind::ALL`] order.
    pub fn all(ctx: &Arc<PreContext>) -> Vec<PreTable> {
        TableKind::ALL
            .iter()
            .map(|kind| PreTable::new(*kind, Arc::clone(ctx)))
            .collect()
    }

    pub fn kind(&self) -> TableKind {
        match self {
            PreTable::Mgid(_) => TableKind::Mgid,
            PreTable::Node(_) => TableKind::Node,
            PreTable::Ecmp(_) => TableKind::Ecmp,
            PreTable::Lag(_) => TableKind::Lag,
            PreTable::Prune(_) => TableKind::Prune,
            PreTable::Port(_) => TableKind::Port,
        }
    }

    /// Declared number of keys. Node and ECMP ids span the whole 32-bit range.
    pub fn size(&self) -> u32 {
        match self {
            PreTable::Mgid(m) => m.size(),
            PreTable::Node(_) | PreTable::Ecmp(_) => ObjectId::MAX,
            PreTable::Lag(m) => m.size(),
            PreTable::Prune(m) => m.size(),
            PreTable::Port(m) => m.size(),
        }
    }

    pub fn entry_add(
        &self,
        sess: SessionHandle,
        target: Target,
        key: ObjectId,
        data: &TableData,
    ) -> PreResult<()> {
        match (self, data) {
            (PreTable::Mgid(m), TableData::Mgid(d)) => m.create(sess, target, key, d),
            (PreTable::Node(m), TableData::Node(d)) => m.create(sess, target, key, d),
            (PreTable::Ecmp(m), TableData::Ecmp(d)) => m.create(sess, target, key, d),
            (PreTable::Lag(m), TableData::Lag(d)) => m.create(sess, target, key, d),
            (PreTable::Prune(m), TableData::Prune(d)) => m.create(sess, target, key, d),
            (PreTable::Port(m), TableData::Port(d)) => m.create(sess, target, key, d),
            _ => Err(self.mismatch(data)),
        }
    }

    pub fn entry_mod(
        &self,
        sess: SessionHandle,
        target: Target,
        key: ObjectId,
        data: &TableData,
    ) -> PreResult<()> {
        match (self, data) {
            (PreTable::Mgid(m), TableData::Mgid(d)) => m.modify(sess, target, key, d),
            (PreTable::Node(m), TableData::Node(d)) => m.modify(sess, target, key, d),
            (PreTable::Ecmp(m), TableData::Ecmp(d)) => m.modify(sess, target, key, d),
            (PreTable::Lag(m), TableData::Lag(d)) => m.modify(sess, target, key, d),
            (PreTable::Prune(m), TableData::Prune(d)) => m.modify(sess, target, key, d),
            (PreTable::Port(m), TableData::Port(d)) => m.modify(sess, target, key, d),
            _ => Err(self.mismatch(data)),
        }
    }

    /// Adds (`ModIncFlag::Add`) or removes the members listed in `data`.
    pub fn entry_mod_inc(
        &self,
        sess: SessionHandle,
        target: Target,
        key: ObjectId,
        data: &TableData,
        flag: ModIncFlag,
    ) -> PreResult<()> {
        match (self, data) {
            (PreTable::Mgid(m), TableData::Mgid(d)) => {
                m.modify_incremental(sess, target, key, d, flag)
            }
            (PreTable::Node(m), TableData::Node(d)) => {
                m.modify_incremental(sess, target, key, d, flag)
            }
            (PreTable::Ecmp(m), TableData::Ecmp(d)) => {
                m.modify_incremental(sess, target, key, d, flag)
            }
            (PreTable::Lag(m), TableData::Lag(d)) => {
                m.modify_incremental(sess, target, key, d, flag)
            }
            (PreTable::Prune(m), TableData::Prune(d)) => {
                m.modify_incremental(sess, target, key, d, flag)
            }
            (PreTable::Port(_), TableData::Port(_)) => Err(PreError::not_supported(format!(
                "incremental modify of {}",
                TableKind::Port
            ))),
            _ => Err(self.mismatch(data)),
        }
    }

    pub fn entry_del(&self, sess: SessionHandle, target: Target, key: ObjectId) -> PreResult<()> {
        match self {
            PreTable::Mgid(m) => m.delete(sess, target, key),
            PreTable::Node(m) => m.delete(sess, target, key),
            PreTable::Ecmp(m) => m.delete(sess, target, key),
            PreTable::Lag(m) => m.delete(sess, target, key),
            PreTable::Prune(m) => m.delete(sess, target, key),
            PreTable::Port(m) => m.delete(sess, target, key),
        }
    }

    pub fn entry_get(
        &self,
        sess: SessionHandle,
        target: Target,
        key: ObjectId,
        template: Option<&TableData>,
    ) -> PreResult<TableData> {
        let (lag, port) = self.read_fields(template)?;
        match self {
            PreTable::Mgid(m) => m.get(sess, target, key).map(TableData::Mgid),
            PreTable::Node(m) => m.get(sess, target, key).map(TableData::Node),
            PreTable::Ecmp(m) => m.get(sess, target, key).map(TableData::Ecmp),
            PreTable::Lag(m) => m.get(sess, target, key, lag).map(TableData::Lag),
            PreTable::Prune(m) => m.get(sess, target, key).map(TableData::Prune),
            PreTable::Port(m) => m.get(sess, target, key, port).map(TableData::Port),
        }
    }

    pub fn entry_get_first(
        &self,
        sess: SessionHandle,
        target: Target,
        template: Option<&TableData>,
    ) -> PreResult<(ObjectId, TableData)> {
        let (lag, port) = self.read_fields(template)?;
        match self {
            PreTable::Mgid(m) => tag_one(m.get_first(sess, target), TableData::Mgid),
            PreTable::Node(m) => tag_one(m.get_first(sess, target), TableData::Node),
            PreTable::Ecmp(m) => tag_one(m.get_first(sess, target), TableData::Ecmp),
            PreTable::Lag(m) => tag_one(m.get_first(sess, target, lag), TableData::Lag),
            PreTable::Prune(m) => tag_one(m.get_first(sess, target), TableData::Prune),
            PreTable::Port(m) => tag_one(m.get_first(sess, target, port), TableData::Port),
        }
    }

    /// Up to `n` entries following `key`. The number returned is the length
    /// of the vector.
    pub fn entry_get_next_n(
        &self,
        sess: SessionHandle,
        target: Target,
        key: ObjectId,
        n: usize,
        template: Option<&TableData>,
    ) -> PreResult<Vec<(ObjectId, TableData)>> {
        let (lag, port) = self.read_fields(template)?;
        match self {
            PreTable::Mgid(m) => tag_all(m.get_next_n(sess, target, key, n), TableData::Mgid),
            PreTable::Node(m) => tag_all(m.get_next_n(sess, target, key, n), TableData::Node),
            PreTable::Ecmp(m) => tag_all(m.get_next_n(sess, target, key, n), TableData::Ecmp),
            PreTable::Lag(m) => tag_all(m.get_next_n(sess, target, key, n, lag), TableData::Lag),
            PreTable::Prune(m) => tag_all(m.get_next_n(sess, target, key, n), TableData::Prune),
            PreTable::Port(m) => {
                tag_all(m.get_next_n(sess, target, key, n, port), TableData::Port)
            }
        }
    }

    pub fn usage_get(&self, sess: SessionHandle, target: Target) -> PreResult<u32> {
        match self {
            PreTable::Mgid(m) => m.usage(sess, target),
            PreTable::Node(m) => m.usage(sess, target),
            PreTable::Ecmp(m) => m.usage(sess, target),
            PreTable::Lag(m) => m.usage(sess, target),
            PreTable::Prune(m) => m.usage(sess, target),
            PreTable::Port(m) => m.usage(sess, target),
        }
    }

    pub fn clear(&self, sess: SessionHandle, target: Target) -> PreResult<()> {
        match self {
            PreTable::Mgid(m) => m.clear(sess, target),
            PreTable::Node(m) => m.clear(sess, target),
            PreTable::Ecmp(m) => m.clear(sess, target),
            PreTable::Lag(m) => m.clear(sess, target),
            PreTable::Prune(m) => m.clear(sess, target),
            PreTable::Port(m) => m.clear(sess, target),
        }
    }

    /// Fields a read of this table covers, taken from `template`.
    fn read_fields(&self, template: Option<&TableData>) -> PreResult<(LagFields, PortFields)> {
        match template {
            None => Ok((LagFields::all(), PortFields::all())),
            Some(data) if data.kind() != self.kind() => Err(self.mismatch(data)),
            Some(TableData::Lag(d)) => Ok((d.fields(), PortFields::all())),
            Some(TableData::Port(d)) => Ok((LagFields::all(), d.fields())),
            Some(_) => Ok((LagFields::all(), PortFields::all())),
        }
    }

    fn mismatch(&self, data: &TableData) -> PreError {
        PreError::invalid_arg(format!("{} entry given to table {}", data.kind(), self.kind()))
    }
}

fn tag_one<D>(
    entry: PreResult<(ObjectId, D)>,
    tag: fn(D) -> TableData,
) -> PreResult<(ObjectId, TableData)> {
    entry.map(|(key, data)| (key, tag(data)))
}

fn tag_all<D>(
    entries: PreResult<Vec<(ObjectId, D)>>,
    tag: fn(D) -> TableData,
) -> PreResult<Vec<(ObjectId, TableData)>> {
    entries.map(|entries| {
        entries
            .into_iter()
            .map(|(key, data)| (key, tag(data)))
            .collect()
    })
}
