//! Constants used throughout the application
//! This module contains the default target identity, advertisement keys,
//! wire tokens and log placeholders.

use uuid::Uuid;

/// Default advertised name of the lock peripheral
pub const DEFAULT_PERIPHERAL_NAME: &str = "esp-test-device";

/// The UUID of the lock service
pub const UUID_LOCK_SERVICE: Uuid = Uuid::from_u128(0x3c3996e0_4d2c_11ed_bdc3_0242ac120002);

/// The UUID of the lock write characteristic
pub const UUID_LOCK_WRITE_CHAR: Uuid = Uuid::from_u128(0x3c399a64_4d2c_11ed_bdc3_0242ac120002);

/// The UUID of the lock notification characteristic
pub const UUID_LOCK_NOTIFY_CHAR: Uuid = Uuid::from_u128(0x3c399c44_4d2c_11ed_bdc3_0242ac120002);

/// Advertisement keys
pub const ADV_LOCAL_NAME: &str = "local_name";
pub const ADV_SERVICE_UUIDS: &str = "service_uuids";
pub const ADV_MANUFACTURER_DATA: &str = "manufacturer_data";
pub const ADV_TX_POWER_LEVEL: &str = "tx_power_level";
pub const ADV_IS_CONNECTABLE: &str = "is_connectable";

/// Logged when an advertisement carries no local name
pub const NO_LOCAL_NAME: &str = "No LocalName";

/// Logged when a discovered device exposes no GAP name
pub const NO_PERIPHERAL_NAME: &str = "No PeripheralName";

/// Logged in place of a notification payload that is not ASCII
pub const UNDECODABLE_PAYLOAD: &str = "broken data";

/// Write tokens
pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";
