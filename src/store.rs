//! Shared configuration and telemetry stores
//!
//! The charger host exposes two cross-plugin key-value stores: a writable
//! configuration database keyed by (plugin, setting) and a read-only live
//! telemetry map written by the charger driver. This module models both as
//! injected trait objects so the bridge never touches ambient globals, and
//! provides in-memory implementations for the demo host and tests.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Minimum charging current the charger hardware accepts, in amps
pub const MIN_CHARGING_CURRENT: i64 = 6;

/// Maximum charging current the charger hardware accepts, in amps
pub const MAX_CHARGING_CURRENT: i64 = 32;

/// Cross-plugin configuration store keyed by (plugin, setting)
pub trait ConfigStore: Send + Sync {
    /// Read a setting, if present
    fn get(&self, plugin: &str, key: &str) -> Option<Value>;

    /// Write a setting
    fn set(&self, plugin: &str, key: &str, value: Value);

    /// Read a boolean setting with a fallback default
    fn get_bool(&self, plugin: &str, key: &str, default: bool) -> bool {
        self.get(plugin, key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Read an integer setting with a fallback default
    fn get_i64(&self, plugin: &str, key: &str, default: i64) -> i64 {
        self.get(plugin, key)
            .and_then(|v| v.as_i64())
            .unwrap_or(default)
    }

    /// Read a string setting with a fallback default
    fn get_str(&self, plugin: &str, key: &str, default: &str) -> String {
        self.get(plugin, key)
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| default.to_string())
    }
}

/// Live charger telemetry written by the driver, read-only for plugins
pub trait RuntimeState: Send + Sync {
    /// Read a telemetry value, if present
    fn get(&self, key: &str) -> Option<Value>;

    /// Read an integer telemetry value with a fallback default
    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
    }

    /// Read a string telemetry value with a fallback default
    fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| default.to_string())
    }
}

/// Highest current the charger may be asked for right now: the hardware
/// ceiling capped by the user-configured overall limit, when one is set.
pub fn max_allowed_current(runtime: &dyn RuntimeState) -> i64 {
    MAX_CHARGING_CURRENT.min(runtime.get_i64("eo_overall_limit_current", MAX_CHARGING_CURRENT))
}

/// In-memory [`ConfigStore`] backed by a lock-guarded map
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, plugin: &str, key: &str) -> Option<Value> {
        self.entries
            .read()
            .ok()?
            .get(&(plugin.to_string(), key.to_string()))
            .cloned()
    }

    fn set(&self, plugin: &str, key: &str, value: Value) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert((plugin.to_string(), key.to_string()), value);
        }
    }
}

/// In-memory [`RuntimeState`] backed by a lock-guarded map
#[derive(Debug, Default)]
pub struct MemoryRuntimeState {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryRuntimeState {
    /// Create an empty telemetry map
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a telemetry value (the charger driver side of the contract)
    pub fn set(&self, key: &str, value: Value) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value);
        }
    }
}

impl RuntimeState for MemoryRuntimeState {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().ok()?.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_store_typed_accessors() {
        let store = MemoryConfigStore::new();
        store.set("switch", "enabled", json!(true));
        store.set("switch", "amps", json!(16));
        store.set("homeassistant", "mqtt_host", json!("broker.local"));

        assert!(store.get_bool("switch", "enabled", false));
        assert_eq!(store.get_i64("switch", "amps", 0), 16);
        assert_eq!(
            store.get_str("homeassistant", "mqtt_host", "localhost"),
            "broker.local"
        );

        // Missing keys fall back to defaults
        assert!(!store.get_bool("scheduler", "enabled", false));
        assert_eq!(store.get_str("homeassistant", "device_id", "fallback"), "fallback");
    }

    #[test]
    fn test_runtime_state_accessors() {
        let runtime = MemoryRuntimeState::new();
        runtime.set("eo_charger_state_id", json!(12));
        runtime.set("app_version", json!("1.2.3"));

        assert_eq!(runtime.get_i64("eo_charger_state_id", 0), 12);
        assert_eq!(runtime.get_str("app_version", "unknown"), "1.2.3");
        assert_eq!(runtime.get_i64("eo_serial_errors", 7), 7);
    }

    #[test]
    fn test_max_allowed_current_respects_overall_limit() {
        let runtime = MemoryRuntimeState::new();
        assert_eq!(max_allowed_current(&runtime), MAX_CHARGING_CURRENT);

        runtime.set("eo_overall_limit_current", json!(20));
        assert_eq!(max_allowed_current(&runtime), 20);

        // An overall limit above the hardware ceiling never raises it
        runtime.set("eo_overall_limit_current", json!(80));
        assert_eq!(max_allowed_current(&runtime), MAX_CHARGING_CURRENT);
    }
}
