use eobridge::config::AppConfig;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_yaml_config_file() {
    let file = write_config(
        r#"
logging:
  level: DEBUG
  file: /tmp/bridge.log
homeassistant:
  enabled: true
  mqtt_host: broker.local
  mqtt_port: 8883
  device_id: garage_charger
  publish_interval_secs: 10
"#,
    );

    let config = AppConfig::from_file(file.path()).unwrap();
    assert_eq!(config.logging.level, "DEBUG");
    assert!(config.homeassistant.enabled);
    assert_eq!(config.homeassistant.mqtt_host, "broker.local");
    assert_eq!(config.homeassistant.mqtt_port, 8883);
    assert_eq!(config.homeassistant.device_id, "garage_charger");
    assert_eq!(config.homeassistant.publish_interval_secs, 10);
    // Unspecified keys keep their defaults
    assert_eq!(config.homeassistant.mqtt_discovery_prefix, "homeassistant");
}

#[test]
fn partial_file_falls_back_to_defaults() {
    let file = write_config("homeassistant:\n  enabled: true\n");

    let config = AppConfig::from_file(file.path()).unwrap();
    assert!(config.homeassistant.enabled);
    assert_eq!(config.homeassistant.mqtt_host, "localhost");
    assert_eq!(config.logging.level, "INFO");
}

#[test]
fn invalid_settings_are_rejected() {
    let file = write_config("homeassistant:\n  mqtt_host: \"\"\n");
    assert!(AppConfig::from_file(file.path()).is_err());
}

#[test]
fn malformed_yaml_is_rejected() {
    let file = write_config("homeassistant: [not, a, mapping");
    assert!(AppConfig::from_file(file.path()).is_err());
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(AppConfig::from_file("/nonexistent/eobridge.yaml").is_err());
}
