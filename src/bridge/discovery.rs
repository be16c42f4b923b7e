//! Home Assistant MQTT auto-discovery publication
//!
//! Publishes one retained config document per catalog entity to
//! `{prefix}/{component}/{device_id}/{object_id}/config` so Home Assistant
//! auto-registers the charger after a restart without replaying state.
//!
//! The catalog is fixed: 10 sensors, 2 binary sensors, 1 switch, 1 number
//! and 1 select. Only the number entity's `max` varies, recomputed at
//! publish time from the user-configured overall current limit.

use crate::config::BridgeConfig;
use crate::logging::get_logger;
use crate::mqtt::{ConnectionFlags, MqttPublisher};
use crate::store::{MIN_CHARGING_CURRENT, RuntimeState, max_allowed_current};
use serde::Serialize;

/// Device descriptor grouping all entities under one logical device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub sw_version: String,
}

/// One discovery config document, serialized as published
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryDoc {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub device: DeviceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<&'static str>>,
}

/// A catalog entity: component kind, object id and its config document
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub component: &'static str,
    pub object_id: &'static str,
    pub doc: DiscoveryDoc,
}

/// Build the device descriptor shown in the Home Assistant UI
pub fn device_info(config: &BridgeConfig, runtime: &dyn RuntimeState) -> DeviceInfo {
    DeviceInfo {
        identifiers: vec![config.device_id.clone()],
        name: config.device_name.clone(),
        manufacturer: "OpenEO",
        model: "EV Charger Controller",
        sw_version: runtime.get_str("app_version", "unknown"),
    }
}

fn base_doc(
    config: &BridgeConfig,
    device: &DeviceInfo,
    object_id: &str,
    name: &str,
) -> DiscoveryDoc {
    DiscoveryDoc {
        name: name.to_string(),
        unique_id: format!("{}_{}", config.device_id, object_id),
        state_topic: format!("openeo/{}/state", config.device_id),
        device: device.clone(),
        value_template: None,
        unit_of_measurement: None,
        device_class: None,
        icon: None,
        payload_on: None,
        payload_off: None,
        command_topic: None,
        min: None,
        max: None,
        step: None,
        options: None,
    }
}

fn sensor(
    config: &BridgeConfig,
    device: &DeviceInfo,
    object_id: &'static str,
    name: &str,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    icon: &'static str,
) -> Entity {
    let mut doc = base_doc(config, device, object_id, name);
    doc.value_template = Some(format!("{{{{ value_json.{} }}}}", object_id));
    doc.unit_of_measurement = unit;
    doc.device_class = device_class;
    doc.icon = Some(icon);
    Entity {
        component: "sensor",
        object_id,
        doc,
    }
}

fn binary_sensor(
    config: &BridgeConfig,
    device: &DeviceInfo,
    object_id: &'static str,
    name: &str,
    device_class: &'static str,
    icon: &'static str,
) -> Entity {
    let mut doc = base_doc(config, device, object_id, name);
    doc.value_template = Some(format!("{{{{ value_json.{} }}}}", object_id));
    doc.payload_on = Some("true");
    doc.payload_off = Some("false");
    doc.device_class = Some(device_class);
    doc.icon = Some(icon);
    Entity {
        component: "binary_sensor",
        object_id,
        doc,
    }
}

/// The full 15-entity catalog for one device.
/// Pure and deterministic for a given runtime state.
pub fn entity_catalog(config: &BridgeConfig, runtime: &dyn RuntimeState) -> Vec<Entity> {
    let device = device_info(config, runtime);
    let device_id = &config.device_id;

    let mut entities = vec![
        sensor(
            config,
            &device,
            "charger_state",
            "Charger State",
            None,
            None,
            "mdi:ev-station",
        ),
        sensor(
            config,
            &device,
            "amps_requested",
            "Amps Requested",
            Some("A"),
            Some("current"),
            "mdi:current-ac",
        ),
        sensor(
            config,
            &device,
            "amps_limit",
            "Amps Limit",
            Some("A"),
            Some("current"),
            "mdi:current-ac",
        ),
        sensor(
            config,
            &device,
            "power_delivered",
            "Power Delivered",
            Some("kW"),
            Some("power"),
            "mdi:flash",
        ),
        sensor(
            config,
            &device,
            "power_requested",
            "Power Requested",
            Some("kW"),
            Some("power"),
            "mdi:flash-outline",
        ),
        sensor(
            config,
            &device,
            "voltage",
            "Voltage",
            Some("V"),
            Some("voltage"),
            "mdi:lightning-bolt",
        ),
        sensor(
            config,
            &device,
            "frequency",
            "Mains Frequency",
            Some("Hz"),
            Some("frequency"),
            "mdi:sine-wave",
        ),
        sensor(
            config,
            &device,
            "current_site",
            "Site Current",
            Some("A"),
            Some("current"),
            "mdi:home-lightning-bolt",
        ),
        sensor(
            config,
            &device,
            "current_vehicle",
            "Vehicle Current",
            Some("A"),
            Some("current"),
            "mdi:car-electric",
        ),
        sensor(
            config,
            &device,
            "current_solar",
            "Solar Current",
            Some("A"),
            Some("current"),
            "mdi:solar-power",
        ),
        binary_sensor(
            config,
            &device,
            "vehicle_connected",
            "Vehicle Connected",
            "connectivity",
            "mdi:car-connected",
        ),
        binary_sensor(
            config,
            &device,
            "charging_active",
            "Charging Active",
            "battery_charging",
            "mdi:battery-charging",
        ),
    ];

    // Charger switch
    let mut doc = base_doc(config, &device, "charger_switch", "Charger Switch");
    doc.command_topic = Some(format!("openeo/{}/command/switch/set", device_id));
    doc.value_template = Some(
        "{{ 'ON' if (value_json.switch_enabled and value_json.switch_on) else 'OFF' }}"
            .to_string(),
    );
    doc.payload_on = Some("ON");
    doc.payload_off = Some("OFF");
    doc.icon = Some("mdi:ev-station");
    doc.device_class = Some("switch");
    entities.push(Entity {
        component: "switch",
        object_id: "charger_switch",
        doc,
    });

    // Current limit number; max follows the overall limit at publish time
    let mut doc = base_doc(config, &device, "current_limit", "Current Limit");
    doc.command_topic = Some(format!("openeo/{}/command/current_limit/set", device_id));
    doc.value_template = Some("{{ value_json.amps_limit }}".to_string());
    doc.min = Some(MIN_CHARGING_CURRENT);
    doc.max = Some(max_allowed_current(runtime));
    doc.step = Some(1);
    doc.unit_of_measurement = Some("A");
    doc.device_class = Some("current");
    doc.icon = Some("mdi:current-ac");
    entities.push(Entity {
        component: "number",
        object_id: "current_limit",
        doc,
    });

    // Charger mode select
    let mut doc = base_doc(config, &device, "charger_mode", "Charger Mode");
    doc.command_topic = Some(format!("openeo/{}/command/mode/set", device_id));
    doc.value_template = Some(
        "{{ 'manual' if value_json.mode == 'manual' else ('schedule' if value_json.mode == 'schedule' else 'off') }}"
            .to_string(),
    );
    doc.options = Some(vec!["manual", "schedule", "off"]);
    doc.icon = Some("mdi:cog");
    entities.push(Entity {
        component: "select",
        object_id: "charger_mode",
        doc,
    });

    entities
}

/// Discovery topic for one entity
pub fn discovery_topic(config: &BridgeConfig, entity: &Entity) -> String {
    format!(
        "{}/{}/{}/{}/config",
        config.mqtt_discovery_prefix, entity.component, config.device_id, entity.object_id
    )
}

/// Render the full catalog as (topic, JSON payload) pairs
pub fn discovery_documents(
    config: &BridgeConfig,
    runtime: &dyn RuntimeState,
) -> Vec<(String, String)> {
    entity_catalog(config, runtime)
        .iter()
        .filter_map(|entity| {
            let topic = discovery_topic(config, entity);
            match serde_json::to_string(&entity.doc) {
                Ok(payload) => Some((topic, payload)),
                Err(e) => {
                    get_logger("discovery")
                        .error(&format!("Failed to encode discovery for {}: {}", topic, e));
                    None
                }
            }
        })
        .collect()
}

/// Publish the retained discovery documents and mark discovery sent.
///
/// Per-entity publish failures are logged and do not abort the remaining
/// entities; the sent flag is set after the full pass either way.
pub async fn publish_discovery(
    publisher: &dyn MqttPublisher,
    config: &BridgeConfig,
    runtime: &dyn RuntimeState,
    flags: &ConnectionFlags,
) {
    let logger = get_logger("discovery");

    for (topic, payload) in discovery_documents(config, runtime) {
        match publisher.publish(&topic, &payload, true).await {
            Ok(()) => logger.debug(&format!("Published discovery for {}", topic)),
            Err(e) => logger.error(&format!("Failed to publish discovery for {}: {}", topic, e)),
        }
    }

    flags.mark_discovery_sent();
    logger.info("Home Assistant discovery messages sent");
}
