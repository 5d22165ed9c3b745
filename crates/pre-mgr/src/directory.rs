//! Bidirectional id/handle directory.
//!
//! Each device keeps one `Directory` per directory-backed category (groups,
//! nodes, ECMP sets). It maps caller ids to driver handles and back, and
//! keeps the mapping a bijection: an insert that would reuse an id or a
//! handle is refused.
//!
//! The directory never creates entries implicitly. Lookups return errors for
//! missing keys rather than default values.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use pre_driver::{PreHandle, PreObjectKind};

use crate::error::DirectoryError;
use crate::types::ObjectId;

/// Bidirectional map between caller ids and driver handles of one kind.
///
/// Iteration and `first`/`next` walk ids in ascending order.
///
/// # Example
///
/// ```
/// use pre_driver::NodeHdl;
/// use pre_mgr::directory::Directory;
///
/// let mut dir = Directory::new();
/// let hdl = NodeHdl::from_raw(0x20).unwrap();
/// dir.insert(7, hdl).unwrap();
///
/// assert_eq!(dir.handle_of(7).unwrap(), hdl);
/// assert_eq!(dir.id_of(hdl).unwrap(), 7);
/// assert!(dir.insert(8, hdl).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Directory<K: PreObjectKind> {
    by_id: BTreeMap<ObjectId, PreHandle<K>>,
    by_handle: HashMap<PreHandle<K>, ObjectId>,
}

impl<K: PreObjectKind> Default for Directory<K> {
    fn default() -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_handle: HashMap::new(),
        }
    }
}

impl<K: PreObjectKind> Directory<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn exists(&self, id: ObjectId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Registers `id <-> handle`. Fails if either side is already mapped.
    pub fn insert(&mut self, id: ObjectId, handle: PreHandle<K>) -> Result<(), DirectoryError> {
        if self.by_id.contains_key(&id) {
            return Err(DirectoryError::IdExists(id));
        }
        if handle.is_sentinel() || self.by_handle.contains_key(&handle) {
            return Err(DirectoryError::HandleExists(handle.as_raw()));
        }
        self.by_id.insert(id, handle);
        self.by_handle.insert(handle, id);
        Ok(())
    }

    /// Unregisters `id` and returns the handle it was mapped to.
    pub fn remove(&mut self, id: ObjectId) -> Result<PreHandle<K>, DirectoryError> {
        let handle = self
            .by_id
            .remove(&id)
            .ok_or(DirectoryError::IdNotFound(id))?;
        self.by_handle.remove(&handle);
        Ok(handle)
    }

    pub fn handle_of(&self, id: ObjectId) -> Result<PreHandle<K>, DirectoryError> {
        self.by_id
            .get(&id)
            .copied()
            .ok_or(DirectoryError::IdNotFound(id))
    }

    pub fn id_of(&self, handle: PreHandle<K>) -> Result<ObjectId, DirectoryError> {
        self.by_handle
            .get(&handle)
            .copied()
            .ok_or(DirectoryError::HandleNotFound(handle.as_raw()))
    }

    /// Entry with the smallest id.
    pub fn first(&self) -> Option<(ObjectId, PreHandle<K>)> {
        self.by_id.iter().next().map(|(id, hdl)| (*id, *hdl))
    }

    /// Entry with the smallest id strictly greater than `id`. `id` itself
    /// need not be present.
    pub fn next(&self, id: ObjectId) -> Option<(ObjectId, PreHandle<K>)> {
        self.by_id
            .range((Bound::Excluded(id), Bound::Unbounded))
            .next()
            .map(|(id, hdl)| (*id, *hdl))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, PreHandle<K>)> + '_ {
        self.by_id.iter().map(|(id, hdl)| (*id, *hdl))
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.by_id.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_handle.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pre_driver::{EcmpHdl, MgidHdl, NodeHdl};
    use pretty_assertions::assert_eq;

    fn hdl(raw: u32) -> NodeHdl {
        NodeHdl::from_raw(raw).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut dir = Directory::new();
        dir.insert(10, hdl(0x100)).unwrap();
        dir.insert(20, hdl(0x200)).unwrap();

        assert!(dir.exists(10));
        assert!(!dir.exists(15));
        assert_eq!(dir.handle_of(20).unwrap(), hdl(0x200));
        assert_eq!(dir.id_of(hdl(0x100)).unwrap(), 10);
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn test_insert_refuses_duplicate_id() {
        let mut dir: Directory<_> = Directory::new();
        dir.insert(1, EcmpHdl::from_raw(5).unwrap()).unwrap();
        assert_eq!(
            dir.insert(1, EcmpHdl::from_raw(6).unwrap()),
            Err(DirectoryError::IdExists(1))
        );
        assert_eq!(dir.handle_of(1).unwrap().as_raw(), 5);
    }

    #[test]
    fn test_insert_refuses_duplicate_handle() {
        let mut dir = Directory::new();
        dir.insert(1, hdl(5)).unwrap();
        assert_eq!(dir.insert(2, hdl(5)), Err(DirectoryError::HandleExists(5)));
        assert!(!dir.exists(2));
    }

    #[test]
    fn test_insert_refuses_sentinel() {
        let mut dir: Directory<_> = Directory::new();
        assert!(dir.insert(1, MgidHdl::SENTINEL).is_err());
        assert!(dir.is_empty());
    }

    #[test]
    fn test_remove_unmaps_both_sides() {
        let mut dir = Directory::new();
        dir.insert(3, hdl(0x30)).unwrap();
        assert_eq!(dir.remove(3).unwrap(), hdl(0x30));
        assert!(dir.id_of(hdl(0x30)).is_err());
        assert_eq!(dir.remove(3), Err(DirectoryError::IdNotFound(3)));

        // The handle can be reused once released.
        dir.insert(4, hdl(0x30)).unwrap();
    }

    #[test]
    fn test_first_and_next_are_ordered() {
        let mut dir = Directory::new();
        for (id, raw) in [(30, 1), (10, 2), (20, 3)] {
            dir.insert(id, hdl(raw)).unwrap();
        }
        assert_eq!(dir.first(), Some((10, hdl(2))));
        assert_eq!(dir.next(10), Some((20, hdl(3))));
        // Starting id need not be present.
        assert_eq!(dir.next(21), Some((30, hdl(1))));
        assert_eq!(dir.next(30), None);
        assert_eq!(dir.ids(), vec![10, 20, 30]);
    }

    #[test]
    fn test_empty_directory() {
        let dir: Directory<pre_driver::NodeKind> = Directory::new();
        assert_eq!(dir.first(), None);
        assert_eq!(dir.next(0), None);
    }

    #[test]
    fn test_clear() {
        let mut dir = Directory::new();
        dir.insert(1, hdl(1)).unwrap();
        dir.clear();
        assert!(dir.is_empty());
        assert!(dir.id_of(hdl(1)).is_err());
    }
}
