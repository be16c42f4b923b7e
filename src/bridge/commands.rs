//! Inbound MQTT command handling
//!
//! Four command topics are derived from the device id; each carries a plain
//! text payload. Commands only mutate the shared config store - they never
//! publish back to MQTT, and no parse or validation failure ever escapes
//! this module.

use crate::logging::get_logger;
use crate::store::{ConfigStore, MIN_CHARGING_CURRENT, RuntimeState, max_allowed_current};
use serde_json::json;

/// Plugins Home Assistant may enable or disable remotely. Anything else is
/// rejected so a crafted payload cannot write arbitrary config keys.
const ALLOWED_PLUGINS: [&str; 3] = ["scheduler", "switch", "loadmanagement"];

/// The four command topics for a device, in dispatch order
pub fn command_topics(device_id: &str) -> [String; 4] {
    [
        format!("openeo/{}/command/switch/set", device_id),
        format!("openeo/{}/command/current_limit/set", device_id),
        format!("openeo/{}/command/mode/set", device_id),
        format!("openeo/{}/command/enable_plugin/set", device_id),
    ]
}

/// Dispatch one inbound command message by exact topic match.
/// Unknown topics are logged and ignored.
pub fn dispatch(
    device_id: &str,
    topic: &str,
    payload: &str,
    store: &dyn ConfigStore,
    runtime: &dyn RuntimeState,
) {
    let logger = get_logger("commands");
    logger.info(&format!("Received command on {}: {}", topic, payload));

    let [switch, current_limit, mode, enable_plugin] = command_topics(device_id);
    if topic == switch {
        handle_switch(payload, store);
    } else if topic == current_limit {
        handle_current_limit(payload, store, runtime);
    } else if topic == mode {
        handle_mode(payload, store);
    } else if topic == enable_plugin {
        handle_enable_plugin(payload, store);
    } else {
        logger.warn(&format!("Unknown command topic: {}", topic));
    }
}

/// Switch on/off. Manual control always disables the scheduler.
fn handle_switch(payload: &str, store: &dyn ConfigStore) {
    let logger = get_logger("commands");
    let switch_on = matches!(payload.to_uppercase().as_str(), "ON" | "TRUE" | "1");

    store.set("switch", "enabled", json!(true));
    store.set("switch", "on", json!(switch_on));
    store.set("scheduler", "enabled", json!(false));

    logger.info(&format!("Switch command executed: {}", switch_on));
}

/// Current limit in amps. Out-of-range values are rejected, not clamped.
fn handle_current_limit(payload: &str, store: &dyn ConfigStore, runtime: &dyn RuntimeState) {
    let logger = get_logger("commands");

    let Ok(value) = payload.parse::<f64>() else {
        logger.error(&format!("Invalid current limit value '{}'", payload));
        return;
    };
    let amps = value.trunc() as i64;

    let max_allowed = max_allowed_current(runtime);
    if !(MIN_CHARGING_CURRENT..=max_allowed).contains(&amps) {
        logger.error(&format!(
            "Invalid current limit: {}. Must be {}-{} amps",
            amps, MIN_CHARGING_CURRENT, max_allowed
        ));
        return;
    }

    store.set("switch", "amps", json!(amps));
    store.set("switch", "enabled", json!(true));
    store.set("scheduler", "enabled", json!(false));

    logger.info(&format!("Current limit set to {}A", amps));
}

/// Operating mode: manual, schedule or off
fn handle_mode(payload: &str, store: &dyn ConfigStore) {
    let logger = get_logger("commands");

    match payload.to_lowercase().as_str() {
        "manual" => {
            store.set("switch", "enabled", json!(true));
            store.set("scheduler", "enabled", json!(false));
            logger.info("Switched to manual mode");
        }
        "schedule" => {
            store.set("scheduler", "enabled", json!(true));
            store.set("switch", "enabled", json!(false));
            logger.info("Switched to schedule mode");
        }
        "off" => {
            store.set("scheduler", "enabled", json!(false));
            store.set("switch", "enabled", json!(false));
            logger.info("All charging modes disabled");
        }
        other => {
            logger.error(&format!(
                "Unknown mode '{}'. Valid modes: manual, schedule, off",
                other
            ));
        }
    }
}

/// Enable or disable one of the allow-listed plugins.
/// Payload format: "plugin_name:bool", e.g. "scheduler:true".
fn handle_enable_plugin(payload: &str, store: &dyn ConfigStore) {
    let logger = get_logger("commands");

    let Some((plugin_name, enabled_str)) = payload.split_once(':') else {
        logger.error(&format!(
            "Invalid plugin command format '{}'. Expected 'plugin:true/false'",
            payload
        ));
        return;
    };

    if !ALLOWED_PLUGINS.contains(&plugin_name) {
        logger.error(&format!(
            "Plugin '{}' not allowed for remote control",
            plugin_name
        ));
        return;
    }

    let enabled = matches!(
        enabled_str.to_lowercase().as_str(),
        "true" | "on" | "1" | "enabled"
    );
    store.set(plugin_name, "enabled", json!(enabled));

    logger.info(&format!(
        "Plugin '{}' {}",
        plugin_name,
        if enabled { "enabled" } else { "disabled" }
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryConfigStore, MemoryRuntimeState};

    fn stores() -> (MemoryConfigStore, MemoryRuntimeState) {
        (MemoryConfigStore::new(), MemoryRuntimeState::new())
    }

    #[test]
    fn switch_on_variants() {
        for payload in ["ON", "on", "TRUE", "1"] {
            let (store, _) = stores();
            handle_switch(payload, &store);
            assert!(store.get_bool("switch", "enabled", false), "{}", payload);
            assert!(store.get_bool("switch", "on", false), "{}", payload);
            assert!(!store.get_bool("scheduler", "enabled", true), "{}", payload);
        }
    }

    #[test]
    fn switch_off_for_anything_else() {
        for payload in ["OFF", "off", "0", "bogus"] {
            let (store, _) = stores();
            handle_switch(payload, &store);
            assert!(store.get_bool("switch", "enabled", false));
            assert!(!store.get_bool("switch", "on", true), "{}", payload);
            assert!(!store.get_bool("scheduler", "enabled", true));
        }
    }

    #[test]
    fn current_limit_accepts_in_range_value() {
        let (store, runtime) = stores();
        handle_current_limit("15", &store, &runtime);
        assert_eq!(store.get_i64("switch", "amps", 0), 15);
        assert!(store.get_bool("switch", "enabled", false));
        assert!(!store.get_bool("scheduler", "enabled", true));
    }

    #[test]
    fn current_limit_truncates_fractional_amps() {
        let (store, runtime) = stores();
        handle_current_limit("12.9", &store, &runtime);
        assert_eq!(store.get_i64("switch", "amps", 0), 12);
    }

    #[test]
    fn current_limit_rejects_garbage() {
        let (store, runtime) = stores();
        handle_current_limit("abc", &store, &runtime);
        assert!(store.get("switch", "amps").is_none());
        assert!(store.get("switch", "enabled").is_none());
    }

    #[test]
    fn current_limit_rejects_out_of_range() {
        let (store, runtime) = stores();
        handle_current_limit("100", &store, &runtime);
        assert!(store.get("switch", "amps").is_none());

        handle_current_limit("2", &store, &runtime);
        assert!(store.get("switch", "amps").is_none());
    }

    #[test]
    fn current_limit_respects_overall_limit() {
        let (store, runtime) = stores();
        runtime.set("eo_overall_limit_current", serde_json::json!(20));

        handle_current_limit("25", &store, &runtime);
        assert!(store.get("switch", "amps").is_none());

        handle_current_limit("20", &store, &runtime);
        assert_eq!(store.get_i64("switch", "amps", 0), 20);
    }

    #[test]
    fn mode_schedule_flips_flags() {
        let (store, _) = stores();
        handle_mode("schedule", &store);
        assert!(store.get_bool("scheduler", "enabled", false));
        assert!(!store.get_bool("switch", "enabled", true));
    }

    #[test]
    fn mode_off_disables_both() {
        let (store, _) = stores();
        handle_mode("off", &store);
        assert!(!store.get_bool("scheduler", "enabled", true));
        assert!(!store.get_bool("switch", "enabled", true));
    }

    #[test]
    fn mode_bogus_mutates_nothing() {
        let (store, _) = stores();
        handle_mode("bogus", &store);
        assert!(store.get("scheduler", "enabled").is_none());
        assert!(store.get("switch", "enabled").is_none());
    }

    #[test]
    fn enable_plugin_allow_listed() {
        let (store, _) = stores();
        handle_enable_plugin("scheduler:true", &store);
        assert!(store.get_bool("scheduler", "enabled", false));

        handle_enable_plugin("scheduler:off", &store);
        assert!(!store.get_bool("scheduler", "enabled", true));
    }

    #[test]
    fn enable_plugin_rejects_unknown_plugin() {
        let (store, _) = stores();
        handle_enable_plugin("hacker:true", &store);
        assert!(store.get("hacker", "enabled").is_none());
    }

    #[test]
    fn enable_plugin_rejects_missing_colon() {
        let (store, _) = stores();
        handle_enable_plugin("switch", &store);
        assert!(store.get("switch", "enabled").is_none());
    }

    #[test]
    fn dispatch_routes_by_exact_topic() {
        let (store, runtime) = stores();
        dispatch(
            "dev1",
            "openeo/dev1/command/mode/set",
            "manual",
            &store,
            &runtime,
        );
        assert!(store.get_bool("switch", "enabled", false));

        // Another device's topic is ignored
        dispatch(
            "dev1",
            "openeo/dev2/command/mode/set",
            "off",
            &store,
            &runtime,
        );
        assert!(store.get_bool("switch", "enabled", false));
    }
}
