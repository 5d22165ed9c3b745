//! Conversions between caller port/LAG lists and driver bitmaps.

use pre_driver::{DevPort, LagId, LagMap, PortMap};

use crate::error::{PreError, PreResult};
use crate::types::ModIncFlag;

/// Builds a port bitmap. Every port must be below `num_ports`.
pub fn port_map(ports: &[DevPort], num_ports: u32) -> PreResult<PortMap> {
    let mut map = PortMap::new();
    for port in ports {
        check_port(*port, num_ports)?;
        map.set(*port as usize);
    }
    Ok(map)
}

/// Builds a LAG bitmap. Every LAG id must be below `num_lags`.
pub fn lag_map(lags: &[LagId], num_lags: u32) -> PreResult<LagMap> {
    let mut map = LagMap::new();
    for lag in lags {
        check_lag(*lag, num_lags)?;
        map.set(*lag as usize);
    }
    Ok(map)
}

/// Sets or clears the listed ports of `map`.
pub fn apply_ports(
    map: &mut PortMap,
    ports: &[DevPort],
    num_ports: u32,
    flag: ModIncFlag,
) -> PreResult<()> {
    for port in ports {
        check_port(*port, num_ports)?;
    }
    for port in ports {
        match flag {
            ModIncFlag::Add => {
                map.set(*port as usize);
            }
            ModIncFlag::Delete => map.clear(*port as usize),
        }
    }
    Ok(())
}

/// Sets or clears the listed LAG ids of `map`.
pub fn apply_lags(
    map: &mut LagMap,
    lags: &[LagId],
    num_lags: u32,
    flag: ModIncFlag,
) -> PreResult<()> {
    for lag in lags {
        check_lag(*lag, num_lags)?;
    }
    for lag in lags {
        match flag {
            ModIncFlag::Add => {
                map.set(*lag as usize);
            }
            ModIncFlag::Delete => map.clear(*lag as usize),
        }
    }
    Ok(())
}

/// Set ports in ascending order.
pub fn port_list(map: &PortMap) -> Vec<DevPort> {
    map.iter().map(|p| p as DevPort).collect()
}

/// Set LAG ids in ascending order.
pub fn lag_list(map: &LagMap) -> Vec<LagId> {
    map.iter().map(|l| l as LagId).collect()
}

pub fn check_port(port: DevPort, num_ports: u32) -> PreResult<()> {
    if port >= num_ports {
        return Err(PreError::invalid_arg(format!(
            "port {} out of range 0..{}",
            port, num_ports
        )));
    }
    Ok(())
}

pub fn check_lag(lag: LagId, num_lags: u32) -> PreResult<()> {
    if lag >= num_lags {
        return Err(PreError::invalid_arg(format!(
            "LAG id {} out of range 0..{}",
            lag, num_lags
        )));
    }
    Ok(())
}
