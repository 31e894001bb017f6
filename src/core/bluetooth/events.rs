//! Inbound adapter events.
//! Every callback the platform radio can deliver is one variant of [`AdapterEvent`].

use thiserror::Error;

use crate::core::bluetooth::types::{
    Advertisement, CharacteristicRef, PeripheralHandle, PeripheralId, RadioState, ServiceRef,
};

/// Failure reported by the platform adapter. Carries the platform's own description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct AdapterError {
    pub description: String,
}

impl AdapterError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl From<bluest::Error> for AdapterError {
    fn from(err: bluest::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug)]
pub enum AdapterEvent {
    RadioStateChanged(RadioState),
    PeripheralDiscovered {
        peripheral: PeripheralHandle,
        advertisement: Advertisement,
        rssi: Option<i16>,
    },
    Connected {
        peripheral: PeripheralId,
    },
    ConnectFailed {
        peripheral: PeripheralId,
        error: AdapterError,
    },
    Disconnected {
        peripheral: PeripheralId,
        error: Option<AdapterError>,
    },
    ServicesDiscovered {
        peripheral: PeripheralId,
        result: Result<Vec<ServiceRef>, AdapterError>,
    },
    CharacteristicsDiscovered {
        peripheral: PeripheralId,
        service: ServiceRef,
        result: Result<Vec<CharacteristicRef>, AdapterError>,
    },
    WriteCompleted {
        peripheral: PeripheralId,
        characteristic: CharacteristicRef,
        result: Result<(), AdapterError>,
    },
    ValueUpdated {
        peripheral: PeripheralId,
        characteristic: CharacteristicRef,
        result: Result<Vec<u8>, AdapterError>,
    },
}

impl AdapterEvent {
    /// The peripheral this event concerns, if any.
    pub fn peripheral_id(&self) -> Option<&PeripheralId> {
        match self {
            Self::RadioStateChanged(_) => None,
            Self::PeripheralDiscovered { peripheral, .. } => Some(peripheral.id()),
            Self::Connected { peripheral }
            | Self::ConnectFailed { peripheral, .. }
            | Self::Disconnected { peripheral, .. }
            | Self::ServicesDiscovered { peripheral, .. }
            | Self::CharacteristicsDiscovered { peripheral, .. }
            | Self::WriteCompleted { peripheral, .. }
            | Self::ValueUpdated { peripheral, .. } => Some(peripheral),
        }
    }
}
