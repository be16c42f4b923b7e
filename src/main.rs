use anyhow::Result;
use eobridge::config::AppConfig;
use eobridge::store::{ConfigStore, MemoryConfigStore, MemoryRuntimeState, RuntimeState};
use eobridge::HaBridge;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let app = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    eobridge::logging::init_logging(&app.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Eobridge Home Assistant MQTT bridge starting up");

    // Stand-in for the charger host's shared stores: seed the config store
    // from the YAML file; the telemetry map would be fed by the driver.
    let store = Arc::new(MemoryConfigStore::new());
    app.homeassistant.write_to_store(store.as_ref());

    let runtime = Arc::new(MemoryRuntimeState::new());
    runtime.set("app_version", json!(env!("CARGO_PKG_VERSION")));

    let mut bridge = HaBridge::new(
        Arc::clone(&store) as Arc<dyn ConfigStore>,
        Arc::clone(&runtime) as Arc<dyn RuntimeState>,
    );
    if bridge.is_disabled() {
        info!("Bridge is disabled; polling will be a no-op");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                bridge.poll().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    bridge.shutdown().await;
    info!("Bridge shutdown complete");
    Ok(())
}
