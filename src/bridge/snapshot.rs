//! Periodic charger state publication
//!
//! Builds one JSON snapshot per cycle from the live telemetry map and the
//! shared config store and publishes it, non-retained, to the device state
//! topic the discovery documents point at.

use crate::config::BridgeConfig;
use crate::logging::get_logger;
use crate::mqtt::MqttPublisher;
use crate::store::{ConfigStore, RuntimeState};
use serde::Serialize;
use serde_json::{Value, json};

// Charger state ids meaning "plug present, car connected or charging"
const PLUG_PRESENT_STATE_IDS: [i64; 10] = [7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

// Charger state ids meaning "charging or charge complete"
const CHARGING_STATE_IDS: [i64; 4] = [11, 12, 13, 14];

/// One published state document
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub charger_state: String,
    pub charger_state_id: i64,
    pub amps_requested: Value,
    pub amps_limit: Value,
    pub power_delivered: Value,
    pub power_requested: Value,
    pub voltage: Value,
    pub frequency: Value,
    pub current_site: Value,
    pub current_vehicle: Value,
    pub current_solar: Value,
    pub vehicle_connected: String,
    pub charging_active: String,
    pub mode: String,
    pub switch_on: bool,
    pub switch_enabled: bool,
    pub serial_errors: Value,
    pub app_version: String,
    pub timestamp: i64,
}

/// Operating mode derived from the two plugin enable flags.
/// Manual override wins; both set or both clear reads as off.
pub fn derive_mode(switch_enabled: bool, scheduler_enabled: bool) -> &'static str {
    if switch_enabled && !scheduler_enabled {
        "manual"
    } else if scheduler_enabled && !switch_enabled {
        "schedule"
    } else {
        "off"
    }
}

// Telemetry values pass through verbatim; missing keys read as zero
fn raw(runtime: &dyn RuntimeState, key: &str) -> Value {
    runtime.get(key).unwrap_or_else(|| json!(0))
}

/// Snapshot the current charger state
pub fn build_snapshot(store: &dyn ConfigStore, runtime: &dyn RuntimeState) -> StateSnapshot {
    let charger_state_id = runtime.get_i64("eo_charger_state_id", 0);
    let vehicle_connected = PLUG_PRESENT_STATE_IDS.contains(&charger_state_id);
    let charging_active = CHARGING_STATE_IDS.contains(&charger_state_id);

    let switch_enabled = store.get_bool("switch", "enabled", false);
    let scheduler_enabled = store.get_bool("scheduler", "enabled", false);

    StateSnapshot {
        charger_state: runtime.get_str("eo_charger_state", ""),
        charger_state_id,
        amps_requested: raw(runtime, "eo_amps_requested"),
        amps_limit: raw(runtime, "eo_amps_limit"),
        power_delivered: raw(runtime, "eo_power_delivered"),
        power_requested: raw(runtime, "eo_power_requested"),
        voltage: raw(runtime, "eo_live_voltage"),
        frequency: raw(runtime, "eo_mains_frequency"),
        current_site: raw(runtime, "eo_current_site"),
        current_vehicle: raw(runtime, "eo_current_vehicle"),
        current_solar: raw(runtime, "eo_current_solar"),
        vehicle_connected: vehicle_connected.to_string(),
        charging_active: charging_active.to_string(),
        mode: derive_mode(switch_enabled, scheduler_enabled).to_string(),
        switch_on: store.get_bool("switch", "on", false),
        switch_enabled,
        serial_errors: raw(runtime, "eo_serial_errors"),
        app_version: runtime.get_str("app_version", "unknown"),
        timestamp: chrono::Utc::now().timestamp(),
    }
}

/// State topic for a device
pub fn state_topic(device_id: &str) -> String {
    format!("openeo/{}/state", device_id)
}

/// Build and publish one state document. Failures are logged, never raised.
pub async fn publish_state(
    publisher: &dyn MqttPublisher,
    config: &BridgeConfig,
    store: &dyn ConfigStore,
    runtime: &dyn RuntimeState,
) {
    let logger = get_logger("snapshot");
    let snapshot = build_snapshot(store, runtime);

    let payload = match serde_json::to_string(&snapshot) {
        Ok(payload) => payload,
        Err(e) => {
            logger.error(&format!("Failed to encode state snapshot: {}", e));
            return;
        }
    };

    match publisher
        .publish(&state_topic(&config.device_id), &payload, false)
        .await
    {
        Ok(()) => logger.debug("Published state to MQTT"),
        Err(e) => logger.error(&format!("Failed to publish state: {}", e)),
    }
}
