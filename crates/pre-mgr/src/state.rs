//! Per-device state and the device registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use pre_driver::{DevId, EcmpKind, MgidKind, NodeKind};

use crate::directory::Directory;
use crate::error::{PreError, PreResult};

/// The directories of one device.
#[derive(Debug, Default)]
pub struct PreDirectories {
    pub mgid: Directory<MgidKind>,
    pub node: Directory<NodeKind>,
    pub ecmp: Directory<EcmpKind>,
}

impl PreDirectories {
    pub fn clear(&mut self) {
        self.mgid.clear();
        self.node.clear();
        self.ecmp.clear();
    }
}

/// State of one device. The mutex is the device state lock: it is held for
/// the whole of every table operation addressed to the device.
#[derive(Debug)]
pub struct DeviceState {
    dev_id: DevId,
    dirs: Mutex<PreDirectories>,
}

impl DeviceState {
    pub fn new(dev_id: DevId) -> Self {
        Self {
            dev_id,
            dirs: Mutex::new(PreDirectories::default()),
        }
    }

    pub fn dev_id(&self) -> DevId {
        self.dev_id
    }

    /// Acquires the device state lock.
    pub fn lock(&self) -> MutexGuard<'_, PreDirectories> {
        self.dirs.lock()
    }
}

/// Device id to device state.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<DevId, Arc<DeviceState>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, dev_id: DevId) -> PreResult<Arc<DeviceState>> {
        let mut devices = self.devices.write();
        if devices.contains_key(&dev_id) {
            return Err(PreError::already_exists(format!("device {}", dev_id)));
        }
        let state = Arc::new(DeviceState::new(dev_id));
        devices.insert(dev_id, Arc::clone(&state));
        Ok(state)
    }

    /// Drops the device and empties its directories. Callers still holding
    /// the state see empty directories afterwards.
    pub fn remove_device(&self, dev_id: DevId) -> PreResult<Arc<DeviceState>> {
        let state = self
            .devices
            .write()
            .remove(&dev_id)
            .ok_or_else(|| PreError::not_found(format!("device {}", dev_id)))?;
        state.lock().clear();
        Ok(state)
    }

    /// Looks up a device. An unknown device is an invalid argument of the
    /// operation addressed to it.
    pub fn get(&self, dev_id: DevId) -> PreResult<Arc<DeviceState>> {
        self.devices
            .read()
            .get(&dev_id)
            .cloned()
            .ok_or_else(|| PreError::invalid_arg(format!("unknown device {}", dev_id)))
    }

    pub fn contains(&self, dev_id: DevId) -> bool {
        self.devices.read().contains_key(&dev_id)
    }

    /// Registered device ids, sorted.
    pub fn device_ids(&self) -> Vec<DevId> {
        let mut ids: Vec<_> = self.devices.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreErrorKind;
    use pre_driver::NodeHdl;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_and_get_device() {
        let registry = DeviceRegistry::new();
        registry.add_device(1).unwrap();
        registry.add_device(0).unwrap();
        assert_eq!(registry.device_ids(), vec![0, 1]);
        assert_eq!(registry.get(1).unwrap().dev_id(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_add_device_twice() {
        let registry = DeviceRegistry::new();
        registry.add_device(0).unwrap();
        let err = registry.add_device(0).unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::AlreadyExists);
    }

    #[test]
    fn test_unknown_device() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.get(4).unwrap_err().kind(), PreErrorKind::InvalidArg);
        assert!(registry.remove_device(4).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_device_empties_state() {
        let registry = DeviceRegistry::new();
        let state = registry.add_device(0).unwrap();
        state
            .lock()
            .node
            .insert(1, NodeHdl::from_raw(9).unwrap())
            .unwrap();

        registry.remove_device(0).unwrap();
        assert!(!registry.contains(0));
        assert!(state.lock().node.is_empty());
        assert!(registry.is_empty());
    }
}
