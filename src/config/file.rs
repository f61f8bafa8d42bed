//! TOML configuration file loading
//!
//! Supports `~/.config/satellite-tools/config.toml` as a persistent config
//! source. All fields are optional: the file is a partial overlay on top of
//! defaults, and command-line values win over it.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::led::LedBackend;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Satellite identity
    #[serde(default)]
    pub satellite: SatelliteFileConfig,

    /// MQTT broker configuration
    #[serde(default)]
    pub mqtt: MqttFileConfig,

    /// LED ring configuration
    #[serde(default)]
    pub leds: LedFileConfig,
}

/// Satellite identity configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SatelliteFileConfig {
    /// Identity used to tag and filter bridge messages
    pub name: Option<String>,
}

/// MQTT broker configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic prefix (e.g. "wyoming-satellite")
    pub topic_prefix: Option<String>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: Option<u64>,
}

/// LED ring configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedFileConfig {
    pub backend: Option<LedBackend>,
    /// Ring brightness (0x00 to 0x1F)
    pub brightness: Option<u8>,
    /// Two `0xRRGGBB` palette colours
    pub palette: Option<[u32; 2]>,
    /// Show the startup flash
    pub boot_flash: Option<bool>,
    /// Delay before a transient action reverts to off
    pub revert_delay_ms: Option<u64>,
}

/// Load the TOML config file
///
/// With an explicit `path`, read and parse errors are returned. Otherwise the
/// standard path is tried and a missing or broken file falls back to
/// `ConfigFile::default()`.
///
/// # Errors
///
/// Returns error if an explicitly given file cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };

    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(ConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(ConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/satellite-tools/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("satellite-tools").join("config.toml"))
}
