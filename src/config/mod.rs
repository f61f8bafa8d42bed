//! Configuration management for satellite tools
//!
//! Values are resolved in priority order: command line (and its env
//! fallbacks) → config file → built-in defaults.

pub mod file;

use std::path::Path;
use std::time::Duration;

pub use file::{ConfigFile, config_file_path, load_config_file};

use crate::bridge::{DEFAULT_TOPIC_PREFIX, TopicScheme};
use crate::identity::SatelliteId;
use crate::led::{LedBackend, LedConfig, MAX_BRIGHTNESS};
use crate::mqtt::{DEFAULT_PORT, MqttConfig};
use crate::revert::DEFAULT_REVERT_DELAY;
use crate::{Error, Result};

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Satellite identity
    pub name: Option<String>,
    /// MQTT broker host
    pub mqtt_host: Option<String>,
    /// MQTT broker port
    pub mqtt_port: Option<u16>,
    /// MQTT username
    pub mqtt_username: Option<String>,
    /// MQTT password
    pub mqtt_password: Option<String>,
    /// Bridge topic prefix
    pub topic_prefix: Option<String>,
    /// LED backend
    pub led_backend: Option<LedBackend>,
    /// Ring brightness
    pub brightness: Option<u8>,
    /// Skip the startup flash
    pub no_boot_flash: bool,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Configured satellite name, if any
    pub name: Option<String>,
    /// Broker settings, present when a host is configured
    pub mqtt: Option<MqttConfig>,
    /// Bridge topic layout
    pub topics: TopicScheme,
    /// LED ring settings
    pub led: LedConfig,
    /// Delay before a transient action reverts to off
    pub revert_delay: Duration,
}

impl Config {
    /// Load the config file and apply command-line overrides
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be loaded or holds
    /// out-of-range values
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let file = load_config_file(path)?;
        Self::resolve(file, overrides)
    }

    /// Merge a parsed config file with command-line overrides
    ///
    /// # Errors
    ///
    /// Returns error if the resulting brightness is above [`MAX_BRIGHTNESS`]
    pub fn resolve(file: ConfigFile, overrides: &Overrides) -> Result<Self> {
        let ConfigFile {
            satellite,
            mqtt,
            leds,
        } = file;

        let mqtt_config = overrides
            .mqtt_host
            .clone()
            .or(mqtt.host)
            .map(|host| {
                let mut config =
                    MqttConfig::new(host, overrides.mqtt_port.or(mqtt.port).unwrap_or(DEFAULT_PORT));
                config.username = overrides.mqtt_username.clone().or(mqtt.username);
                config.password = overrides.mqtt_password.clone().or(mqtt.password);
                if let Some(secs) = mqtt.keep_alive_secs {
                    config.keep_alive = Duration::from_secs(secs);
                }
                config
            });

        let prefix = overrides
            .topic_prefix
            .clone()
            .or(mqtt.topic_prefix)
            .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string());

        let defaults = LedConfig::default();
        let led = LedConfig {
            backend: overrides
                .led_backend
                .or(leds.backend)
                .unwrap_or(defaults.backend),
            brightness: overrides
                .brightness
                .or(leds.brightness)
                .unwrap_or(defaults.brightness),
            palette: leds.palette.map_or(defaults.palette, |[a, b]| (a, b)),
            boot_flash: !overrides.no_boot_flash && leds.boot_flash.unwrap_or(defaults.boot_flash),
        };
        if led.brightness > MAX_BRIGHTNESS {
            return Err(Error::Config(format!(
                "LED brightness {:#04x} is above the maximum {MAX_BRIGHTNESS:#04x}",
                led.brightness
            )));
        }

        Ok(Self {
            name: overrides.name.clone().or(satellite.name),
            mqtt: mqtt_config,
            topics: TopicScheme::new(&prefix),
            led,
            revert_delay: leds
                .revert_delay_ms
                .map_or(DEFAULT_REVERT_DELAY, Duration::from_millis),
        })
    }

    /// Satellite identity: the configured name, or the hostname
    ///
    /// # Errors
    ///
    /// Returns error if the configured name is empty or the hostname is unusable
    pub fn satellite_id(&self) -> Result<SatelliteId> {
        match &self.name {
            Some(name) => SatelliteId::new(name.clone()),
            None => SatelliteId::from_hostname(),
        }
    }

    /// Broker settings
    ///
    /// # Errors
    ///
    /// Returns error if no broker host is configured
    pub fn require_mqtt(&self) -> Result<&MqttConfig> {
        self.mqtt.as_ref().ok_or_else(|| {
            Error::Config("MQTT broker host is required (--mqtt-host or [mqtt] host)".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(toml: &str) -> ConfigFile {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = Config::resolve(ConfigFile::default(), &Overrides::default()).unwrap();

        assert!(config.mqtt.is_none());
        assert!(config.require_mqtt().is_err());
        assert_eq!(config.topics.prefix(), DEFAULT_TOPIC_PREFIX);
        assert_eq!(config.led, LedConfig::default());
        assert_eq!(config.revert_delay, Duration::from_secs(2));
    }

    #[test]
    fn command_line_wins_over_file() {
        let overrides = Overrides {
            name: Some("kitchen".to_string()),
            mqtt_port: Some(1884),
            brightness: Some(0x10),
            no_boot_flash: true,
            ..Overrides::default()
        };
        let config = Config::resolve(
            file(
                r#"
                [satellite]
                name = "living_room"
                [mqtt]
                host = "broker.local"
                port = 8883
                username = "sat"
                [leds]
                brightness = 4
                boot_flash = true
                revert_delay_ms = 500
                "#,
            ),
            &overrides,
        )
        .unwrap();

        assert_eq!(config.satellite_id().unwrap().as_str(), "kitchen");
        let mqtt = config.require_mqtt().unwrap();
        assert_eq!(mqtt.host, "broker.local");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(mqtt.username.as_deref(), Some("sat"));
        assert_eq!(config.led.brightness, 0x10);
        assert!(!config.led.boot_flash);
        assert_eq!(config.revert_delay, Duration::from_millis(500));
    }

    #[test]
    fn empty_name_is_rejected() {
        let overrides = Overrides {
            name: Some(String::new()),
            ..Overrides::default()
        };
        let config = Config::resolve(ConfigFile::default(), &overrides).unwrap();
        assert!(config.satellite_id().is_err());
    }

    #[test]
    fn file_palette_is_used() {
        let config = Config::resolve(
            file("[leds]\npalette = [0x0080FF, 0x007A37]\n"),
            &Overrides::default(),
        )
        .unwrap();
        assert_eq!(config.led.palette, (0x0080_FF, 0x007A_37));
    }

    #[test]
    fn file_brightness_above_firmware_range_is_rejected() {
        let result = Config::resolve(file("[leds]\nbrightness = 200\n"), &Overrides::default());
        assert!(matches!(result, Err(Error::Config(_))));

        let config = Config::resolve(file("[leds]\nbrightness = 0x1F\n"), &Overrides::default())
            .unwrap();
        assert_eq!(config.led.brightness, MAX_BRIGHTNESS);
    }
}
