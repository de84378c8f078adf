//! fgbridge settings crate
//!
//! Loads, validates and saves the bridge configuration.

pub mod config;
pub mod error;

pub use config::{BridgeConfig, BusSettings, ProtocolSettings, SerialSettings};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
