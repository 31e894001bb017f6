//! Defines shared data structures for the Bluetooth module.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::core::bluetooth::constants::{
    ADV_IS_CONNECTABLE, ADV_LOCAL_NAME, ADV_MANUFACTURER_DATA, ADV_SERVICE_UUIDS,
    ADV_TX_POWER_LEVEL, NO_LOCAL_NAME,
};

/// Power/authorization state of the local radio, as reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
    /// A raw platform code outside the known set.
    Unrecognized(u8),
}

impl RadioState {
    /// Maps a raw platform state code (CoreBluetooth numbering) to a `RadioState`.
    pub fn from_raw(code: u8) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Resetting,
            2 => Self::Unsupported,
            3 => Self::Unauthorized,
            4 => Self::PoweredOff,
            5 => Self::PoweredOn,
            other => Self::Unrecognized(other),
        }
    }

    /// Human-readable label written to the session log.
    pub fn label(&self) -> String {
        match self {
            Self::Unknown => "unknown".to_string(),
            Self::Resetting => "resetting".to_string(),
            Self::Unsupported => "unsupported".to_string(),
            Self::Unauthorized => "unauthorized".to_string(),
            Self::PoweredOff => "poweredOff".to_string(),
            Self::PoweredOn => "poweredOn".to_string(),
            Self::Unrecognized(code) => format!("unrecognized radio state ({})", code),
        }
    }

    pub fn is_powered_on(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

/// The one peripheral this central talks to, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    /// Advertised local name, matched exactly and case-sensitively
    pub name: String,
    /// Service the scan is filtered to
    pub service_uuid: Uuid,
    /// Characteristic that receives "ON"/"OFF" writes
    pub write_characteristic_uuid: Uuid,
    /// Characteristic that pushes notifications back
    pub notify_characteristic_uuid: Uuid,
}

/// Platform-specific identifier of a discovered peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owned reference to a discovered peripheral.
///
/// Deliberately not `Clone`: the handle moves out of the discovery event into the
/// controller and is dropped when the session ends. Everything else refers to the
/// peripheral through its [`PeripheralId`].
#[derive(Debug, PartialEq, Eq)]
pub struct PeripheralHandle {
    id: PeripheralId,
    /// GAP device name, which may differ from the advertised local name
    name: Option<String>,
    /// MAC address when the platform exposes one
    address: Option<String>,
}

impl PeripheralHandle {
    pub fn new(id: PeripheralId, name: Option<String>, address: Option<String>) -> Self {
        Self { id, name, address }
    }

    pub fn id(&self) -> &PeripheralId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}

/// Lookup handle for a service on the held peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceRef {
    pub uuid: Uuid,
}

/// Lookup handle for a characteristic on the held peripheral. Not owned; the
/// adapter resolves it against its own registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicRef {
    pub service: Uuid,
    pub uuid: Uuid,
}

/// A single value in an advertisement payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvertisementValue {
    Text(String),
    Bytes(Vec<u8>),
    Uuids(Vec<Uuid>),
    Integer(i64),
    Flag(bool),
}

/// Advertisement payload: advertisement keys mapped to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Advertisement {
    entries: HashMap<String, AdvertisementValue>,
}

impl Advertisement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an advertisement carrying only a local name.
    pub fn with_local_name(name: impl Into<String>) -> Self {
        let mut adv = Self::new();
        adv.insert(ADV_LOCAL_NAME, AdvertisementValue::Text(name.into()));
        adv
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AdvertisementValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AdvertisementValue> {
        self.entries.get(key)
    }

    /// The advertised local name, if present as text.
    pub fn local_name(&self) -> Option<&str> {
        match self.entries.get(ADV_LOCAL_NAME) {
            Some(AdvertisementValue::Text(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// The advertised local name, or the placeholder when absent.
    pub fn local_name_or_placeholder(&self) -> &str {
        self.local_name().unwrap_or(NO_LOCAL_NAME)
    }
}

/// One-line summary for discovery diagnostics.
impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name={}", self.local_name_or_placeholder())?;
        if let Some(AdvertisementValue::Uuids(services)) = self.get(ADV_SERVICE_UUIDS) {
            write!(f, " services={:?}", services)?;
        }
        if let Some(AdvertisementValue::Bytes(data)) = self.get(ADV_MANUFACTURER_DATA) {
            write!(f, " manufacturer_data={}B", data.len())?;
        }
        if let Some(AdvertisementValue::Integer(power)) = self.get(ADV_TX_POWER_LEVEL) {
            write!(f, " tx_power={}dBm", power)?;
        }
        if let Some(AdvertisementValue::Flag(connectable)) = self.get(ADV_IS_CONNECTABLE) {
            write!(f, " connectable={}", connectable)?;
        }
        Ok(())
    }
}

/// Where the session currently sits. Derived from the controller's fields, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Connecting,
    Connected,
    Resolving,
    Ready,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_labels_cover_every_state() {
        let labels: Vec<String> = (0..=6).map(|code| RadioState::from_raw(code).label()).collect();
        assert_eq!(
            labels,
            vec![
                "unknown",
                "resetting",
                "unsupported",
                "unauthorized",
                "poweredOff",
                "poweredOn",
                "unrecognized radio state (6)",
            ]
        );
    }

    #[test]
    fn only_powered_on_allows_scanning() {
        assert!(RadioState::PoweredOn.is_powered_on());
        assert!(!RadioState::PoweredOff.is_powered_on());
        assert!(!RadioState::Unrecognized(9).is_powered_on());
    }

    #[test]
    fn missing_local_name_uses_placeholder() {
        let adv = Advertisement::new();
        assert_eq!(adv.local_name(), None);
        assert_eq!(adv.local_name_or_placeholder(), NO_LOCAL_NAME);
    }

    #[test]
    fn non_text_local_name_is_treated_as_missing() {
        let mut adv = Advertisement::new();
        adv.insert(ADV_LOCAL_NAME, AdvertisementValue::Bytes(vec![0x41]));
        assert_eq!(adv.local_name(), None);
    }

    #[test]
    fn local_name_is_read_from_payload() {
        let adv = Advertisement::with_local_name("esp-test-device");
        assert_eq!(adv.local_name(), Some("esp-test-device"));
    }

    #[test]
    fn summary_lists_advertised_fields() {
        let mut adv = Advertisement::with_local_name("esp-test-device");
        adv.insert(ADV_MANUFACTURER_DATA, AdvertisementValue::Bytes(vec![1, 2, 3]));
        adv.insert(ADV_TX_POWER_LEVEL, AdvertisementValue::Integer(-4));
        adv.insert(ADV_IS_CONNECTABLE, AdvertisementValue::Flag(true));
        assert_eq!(
            adv.to_string(),
            "name=esp-test-device manufacturer_data=3B tx_power=-4dBm connectable=true"
        );
        assert_eq!(Advertisement::new().to_string(), format!("name={}", NO_LOCAL_NAME));
    }
}
