use super::*;

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_username: String::new(),
            mqtt_password: String::new(),
            mqtt_discovery_prefix: "homeassistant".to_string(),
            device_name: "OpenEO Charger".to_string(),
            device_id: "openeo_charger_1".to_string(),
            publish_interval_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/eobridge.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}
