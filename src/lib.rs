//! BLE lock central library
//! Scans for one lock peripheral, connects to it and toggles its state over GATT.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod state;
pub mod utils;

use std::path::PathBuf;

pub use commands::{ControlCommand, ControlHandle};
pub use config::AppConfig;
pub use crate::core::{BluetoothManager, ConnectionController};
pub use state::{ModelHandle, ObservableModel};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "BLE_LOCK_CONFIG";

/// Picks the config file: explicit argument, then `BLE_LOCK_CONFIG`, then the
/// default file name in the working directory.
pub fn resolve_config_path(arg: Option<String>) -> PathBuf {
    arg.or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::CONFIG_FILE_NAME))
}
