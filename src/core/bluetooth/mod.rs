//! Bluetooth functionality for the lock central
//! This module handles all bluetooth operations including scanning,
//! connecting, and exchanging data with the lock peripheral.

pub mod bluest_central;
pub mod central;
pub mod commands;
pub mod connection;
pub mod constants;
pub mod events;
pub mod manager;
pub mod notification;
pub mod scanner;
#[cfg(test)]
pub mod testing;
pub mod types;

// Re-export types that should be publicly accessible
pub use bluest_central::BluestCentral;
pub use central::Central;
pub use commands::LockCommand;
pub use constants::*; // Re-export all constants
pub use events::{AdapterError, AdapterEvent};
pub use manager::BluetoothManager;
pub use types::{
    Advertisement, AdvertisementValue, CharacteristicRef, PeripheralHandle, PeripheralId,
    RadioState, ServiceRef, SessionState, TargetIdentity,
};
