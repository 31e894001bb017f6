use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    DEFAULT_PERIPHERAL_NAME, UUID_LOCK_NOTIFY_CHAR, UUID_LOCK_SERVICE, UUID_LOCK_WRITE_CHAR,
};
use crate::core::bluetooth::types::TargetIdentity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("peripheral name must not be empty")]
    EmptyName,
    #[error("invalid {field} UUID {value:?}: {source}")]
    InvalidUuid {
        field: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },
}

/// Identity of the lock peripheral, as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Advertised local name, matched exactly
    pub peripheral_name: String,
    pub service_uuid: String,
    pub write_characteristic_uuid: String,
    pub notify_characteristic_uuid: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            peripheral_name: DEFAULT_PERIPHERAL_NAME.to_string(),
            service_uuid: UUID_LOCK_SERVICE.to_string(),
            write_characteristic_uuid: UUID_LOCK_WRITE_CHAR.to_string(),
            notify_characteristic_uuid: UUID_LOCK_NOTIFY_CHAR.to_string(),
        }
    }
}

impl TargetConfig {
    /// Validates the stored strings into the immutable identity the controller uses.
    pub fn to_identity(&self) -> Result<TargetIdentity, ConfigError> {
        if self.peripheral_name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(TargetIdentity {
            name: self.peripheral_name.clone(),
            service_uuid: parse_uuid("service", &self.service_uuid)?,
            write_characteristic_uuid: parse_uuid("write characteristic", &self.write_characteristic_uuid)?,
            notify_characteristic_uuid: parse_uuid("notify characteristic", &self.notify_characteristic_uuid)?,
        })
    }
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ConfigError> {
    Uuid::parse_str(value).map_err(|source| ConfigError::InvalidUuid {
        field,
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity_matches_lock_constants() {
        let identity = TargetConfig::default().to_identity().unwrap();
        assert_eq!(identity.name, "esp-test-device");
        assert_eq!(identity.service_uuid, UUID_LOCK_SERVICE);
        assert_eq!(identity.write_characteristic_uuid, UUID_LOCK_WRITE_CHAR);
        assert_eq!(identity.notify_characteristic_uuid, UUID_LOCK_NOTIFY_CHAR);
    }

    #[test]
    fn uppercase_uuids_are_accepted() {
        let config = TargetConfig {
            write_characteristic_uuid: "3C399A64-4D2C-11ED-BDC3-0242AC120002".to_string(),
            ..TargetConfig::default()
        };
        let identity = config.to_identity().unwrap();
        assert_eq!(identity.write_characteristic_uuid, UUID_LOCK_WRITE_CHAR);
    }

    #[test]
    fn empty_name_is_rejected() {
        let config = TargetConfig {
            peripheral_name: String::new(),
            ..TargetConfig::default()
        };
        assert!(matches!(config.to_identity(), Err(ConfigError::EmptyName)));
    }

    #[test]
    fn bad_uuid_names_the_field() {
        let config = TargetConfig {
            notify_characteristic_uuid: "xyz".to_string(),
            ..TargetConfig::default()
        };
        let err = config.to_identity().unwrap_err();
        assert!(err.to_string().starts_with("invalid notify characteristic UUID"));
    }
}
