//! Core functionality for the lock central
//! This module contains the BLE session state machine and its platform adapter

pub mod bluetooth;
pub mod controller;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use controller::ConnectionController;
