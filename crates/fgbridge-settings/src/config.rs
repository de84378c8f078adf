//! Bridge configuration
//!
//! Supports JSON and TOML files. Every section has defaults, so a file only
//! needs the values it changes:
//!
//! ```toml
//! [serial]
//! device = "/dev/ttyUSB0"
//!
//! [bus]
//! socket_path = "/run/fg.socket"
//! ```

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use fgbridge_core::{DEFAULT_MAX_PAYLOAD, MAX_DECLARED_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path of the hardware link
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl SerialSettings {
    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device: "/dev/ttyAMA0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 10_000,
        }
    }
}

/// Coordinator bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Unix socket the coordinator listens on
    pub socket_path: PathBuf,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/fg.socket"),
        }
    }
}

/// Framing limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Largest payload accepted in either direction
    pub max_payload: usize,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial line
    pub serial: SerialSettings,
    /// Coordinator bus
    pub bus: BusSettings,
    /// Framing limits
    pub protocol: ProtocolSettings,
}

impl BridgeConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<config dir>/fgbridge/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fgbridge").join("config.toml"))
    }

    /// Load the configuration the binary should run with
    ///
    /// An explicit path must load. Without one, the default location is
    /// used if a file exists there, and built-in defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from_file(&path),
            _ => {
                tracing::debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = Format::of(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content).map_err(|e| {
            SettingsError::SaveError(format!("failed to write {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.device.trim().is_empty() {
            return Err(ConfigError::MissingKey("serial.device".to_string()));
        }

        if self.serial.baud_rate == 0 {
            return Err(out_of_range("serial.baud_rate", self.serial.baud_rate));
        }

        if self.serial.read_timeout_ms == 0 {
            return Err(out_of_range(
                "serial.read_timeout_ms",
                self.serial.read_timeout_ms,
            ));
        }

        if self.bus.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingKey("bus.socket_path".to_string()));
        }

        let max = self.protocol.max_payload;
        if max == 0 || max > MAX_DECLARED_LENGTH {
            return Err(out_of_range("protocol.max_payload", max));
        }

        Ok(())
    }
}

fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("none").to_string(),
            )),
        }
    }
}
