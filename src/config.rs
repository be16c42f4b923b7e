//! Configuration management for Eobridge
//!
//! The bridge itself is configured through the shared config store under the
//! `homeassistant` plugin namespace; [`BridgeConfig`] is the typed snapshot
//! of those settings. [`AppConfig`] is the YAML file the demo host binary
//! loads to seed the store and configure logging.

use crate::error::{BridgeError, Result};
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

mod defaults;

/// Config-store namespace owned by this plugin
pub const PLUGIN_NAME: &str = "homeassistant";

/// Bridge settings, snapshotted once at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Whether the bridge is active at all
    pub enabled: bool,

    /// MQTT broker hostname or IP
    pub mqtt_host: String,

    /// MQTT broker port (typically 1883)
    pub mqtt_port: u16,

    /// Broker username; empty disables authentication
    pub mqtt_username: String,

    /// Broker password, used only when a username is set
    pub mqtt_password: String,

    /// Home Assistant discovery topic prefix
    pub mqtt_discovery_prefix: String,

    /// Device name shown in the Home Assistant UI
    pub device_name: String,

    /// Device identifier used in topics and unique ids
    pub device_id: String,

    /// Seconds between state publications
    pub publish_interval_secs: u64,
}

impl BridgeConfig {
    /// Snapshot the bridge settings from the shared config store,
    /// falling back to defaults for any missing key.
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let d = Self::default();
        Self {
            enabled: store.get_bool(PLUGIN_NAME, "enabled", d.enabled),
            mqtt_host: store.get_str(PLUGIN_NAME, "mqtt_host", &d.mqtt_host),
            mqtt_port: store
                .get_i64(PLUGIN_NAME, "mqtt_port", i64::from(d.mqtt_port))
                .try_into()
                .unwrap_or(d.mqtt_port),
            mqtt_username: store.get_str(PLUGIN_NAME, "mqtt_username", &d.mqtt_username),
            mqtt_password: store.get_str(PLUGIN_NAME, "mqtt_password", &d.mqtt_password),
            mqtt_discovery_prefix: store.get_str(
                PLUGIN_NAME,
                "mqtt_discovery_prefix",
                &d.mqtt_discovery_prefix,
            ),
            device_name: store.get_str(PLUGIN_NAME, "device_name", &d.device_name),
            device_id: store.get_str(PLUGIN_NAME, "device_id", &d.device_id),
            publish_interval_secs: store
                .get_i64(
                    PLUGIN_NAME,
                    "publish_interval",
                    d.publish_interval_secs as i64,
                )
                .max(1) as u64,
        }
    }

    /// Write this snapshot into the shared config store (host seeding path)
    pub fn write_to_store(&self, store: &dyn ConfigStore) {
        store.set(PLUGIN_NAME, "enabled", json!(self.enabled));
        store.set(PLUGIN_NAME, "mqtt_host", json!(self.mqtt_host));
        store.set(PLUGIN_NAME, "mqtt_port", json!(self.mqtt_port));
        store.set(PLUGIN_NAME, "mqtt_username", json!(self.mqtt_username));
        store.set(PLUGIN_NAME, "mqtt_password", json!(self.mqtt_password));
        store.set(
            PLUGIN_NAME,
            "mqtt_discovery_prefix",
            json!(self.mqtt_discovery_prefix),
        );
        store.set(PLUGIN_NAME, "device_name", json!(self.device_name));
        store.set(PLUGIN_NAME, "device_id", json!(self.device_id));
        store.set(
            PLUGIN_NAME,
            "publish_interval",
            json!(self.publish_interval_secs),
        );
    }

    /// Validate the snapshot
    pub fn validate(&self) -> Result<()> {
        if self.mqtt_host.is_empty() {
            return Err(BridgeError::validation(
                "mqtt_host",
                "Broker host cannot be empty",
            ));
        }

        if self.mqtt_port == 0 {
            return Err(BridgeError::validation(
                "mqtt_port",
                "Port must be greater than 0",
            ));
        }

        if self.device_id.is_empty() {
            return Err(BridgeError::validation(
                "device_id",
                "Device id cannot be empty",
            ));
        }

        if self.publish_interval_secs == 0 {
            return Err(BridgeError::validation(
                "publish_interval",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// One configurable option, as rendered by the host settings UI
#[derive(Debug, Clone, Serialize)]
pub struct SettingSpec {
    /// Setting key within this plugin's namespace
    pub key: &'static str,

    /// Value kind: "bool", "str" or "int"
    pub kind: &'static str,

    /// Human-readable label
    pub title: &'static str,
}

/// Configuration options exposed to the host settings UI
pub fn settings_schema() -> Vec<SettingSpec> {
    vec![
        SettingSpec {
            key: "enabled",
            kind: "bool",
            title: "Enable Home Assistant MQTT",
        },
        SettingSpec {
            key: "mqtt_host",
            kind: "str",
            title: "MQTT Broker Host",
        },
        SettingSpec {
            key: "mqtt_port",
            kind: "int",
            title: "MQTT Broker Port",
        },
        SettingSpec {
            key: "mqtt_username",
            kind: "str",
            title: "MQTT Username (optional)",
        },
        SettingSpec {
            key: "mqtt_password",
            kind: "str",
            title: "MQTT Password (optional)",
        },
        SettingSpec {
            key: "mqtt_discovery_prefix",
            kind: "str",
            title: "HA Discovery Prefix",
        },
        SettingSpec {
            key: "device_name",
            kind: "str",
            title: "Device Name in HA",
        },
        SettingSpec {
            key: "device_id",
            kind: "str",
            title: "Device ID",
        },
        SettingSpec {
            key: "publish_interval",
            kind: "int",
            title: "Publish Interval (seconds)",
        },
    ]
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file or directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Top-level configuration for the demo host binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Bridge settings seeded into the shared config store at startup
    pub homeassistant: BridgeConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&contents)?;
        config.homeassistant.validate()?;
        Ok(config)
    }

    /// Load configuration from the default locations, falling back to defaults
    pub fn load() -> Result<Self> {
        let default_paths = ["eobridge_config.yaml", "/etc/eobridge/config.yaml"];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.mqtt_host, "localhost");
        assert_eq!(config.mqtt_port, 1883);
        assert_eq!(config.mqtt_discovery_prefix, "homeassistant");
        assert_eq!(config.device_name, "OpenEO Charger");
        assert_eq!(config.device_id, "openeo_charger_1");
        assert_eq!(config.publish_interval_secs, 5);
    }

    #[test]
    fn test_from_store_roundtrip() {
        let store = MemoryConfigStore::new();
        let mut config = BridgeConfig::default();
        config.enabled = true;
        config.mqtt_host = "broker.local".to_string();
        config.mqtt_port = 8883;
        config.device_id = "garage_charger".to_string();
        config.write_to_store(&store);

        let loaded = BridgeConfig::from_store(&store);
        assert!(loaded.enabled);
        assert_eq!(loaded.mqtt_host, "broker.local");
        assert_eq!(loaded.mqtt_port, 8883);
        assert_eq!(loaded.device_id, "garage_charger");
    }

    #[test]
    fn test_from_store_uses_defaults_for_missing_keys() {
        let store = MemoryConfigStore::new();
        let config = BridgeConfig::from_store(&store);
        assert!(!config.enabled);
        assert_eq!(config.mqtt_host, "localhost");
        assert_eq!(config.publish_interval_secs, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = BridgeConfig::default();
        assert!(config.validate().is_ok());

        config.mqtt_host = String::new();
        assert!(config.validate().is_err());

        config = BridgeConfig::default();
        config.mqtt_port = 0;
        assert!(config.validate().is_err());

        config = BridgeConfig::default();
        config.publish_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_schema_covers_every_key() {
        let schema = settings_schema();
        assert_eq!(schema.len(), 9);
        let keys: Vec<&str> = schema.iter().map(|s| s.key).collect();
        assert!(keys.contains(&"enabled"));
        assert!(keys.contains(&"publish_interval"));
    }

    #[test]
    fn test_app_config_serialization() {
        let config = AppConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            config.homeassistant.mqtt_port,
            deserialized.homeassistant.mqtt_port
        );
    }
}
