//! Resource manager configuration.

use pre_driver::{LagMap, PortMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse PRE configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid PRE configuration: {field} {message}")]
    Invalid { field: &'static str, message: String },
}

/// Table geometry and behavior switches of the resource manager.
///
/// Missing JSON fields take their default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreMgrConfig {
    /// Highest MGID accepted by the group table.
    pub max_mgid: u32,
    /// Number of LAG entries; LAG ids run from 0 to `lag_table_size - 1`.
    pub lag_table_size: u32,
    /// Number of L2 exclusion ids in the prune table.
    pub prune_table_size: u32,
    /// Number of device ports. Bounds the port table and every port bitmap.
    pub num_dev_ports: u32,
    /// Emit audit records for lifecycle changes.
    pub audit_enabled: bool,
}

impl Default for PreMgrConfig {
    fn default() -> Self {
        Self {
            max_mgid: 65535,
            lag_table_size: 255,
            prune_table_size: 288,
            num_dev_ports: 288,
            audit_enabled: true,
        }
    }
}

impl PreMgrConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_mgid > u32::from(u16::MAX) {
            return Err(ConfigError::Invalid {
                field: "max_mgid",
                message: format!("{} exceeds the 16-bit MGID space", self.max_mgid),
            });
        }
        check_size("lag_table_size", self.lag_table_size, LagMap::CAPACITY)?;
        check_size("prune_table_size", self.prune_table_size, usize::MAX)?;
        check_size("num_dev_ports", self.num_dev_ports, PortMap::CAPACITY)?;
        Ok(())
    }
}

fn check_size(field: &'static str, value: u32, capacity: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            message: "must be non-zero".to_string(),
        });
    }
    if value as usize > capacity {
        return Err(ConfigError::Invalid {
            field,
            message: format!("{} exceeds capacity {}", value, capacity),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        let config = PreMgrConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lag_table_size, 255);
        assert_eq!(config.num_dev_ports, 288);
    }

    #[test]
    fn test_from_json_partial() {
        let config = PreMgrConfig::from_json(r#"{"num_dev_ports": 64, "audit_enabled": false}"#)
            .unwrap();
        assert_eq!(config.num_dev_ports, 64);
        assert!(!config.audit_enabled);
        assert_eq!(config.max_mgid, 65535);
    }

    #[test]
    fn test_rejects_oversized_tables() {
        let err = PreMgrConfig::from_json(r#"{"num_dev_ports": 4096}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "num_dev_ports", .. }));

        let err = PreMgrConfig::from_json(r#"{"lag_table_size": 257}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "lag_table_size", .. }));

        let err = PreMgrConfig::from_json(r#"{"max_mgid": 70000}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_mgid", .. }));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let config = PreMgrConfig {
            prune_table_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PreMgrConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
