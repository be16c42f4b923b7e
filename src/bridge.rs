//! Home Assistant bridge plugin
//!
//! [`HaBridge`] is the host-facing facade: constructed with the two shared
//! stores, polled on the host's cadence, torn down at shutdown. The MQTT
//! event loop runs on its own task and shares state with the poll hook
//! through [`crate::mqtt::ConnectionFlags`].

use crate::config::{BridgeConfig, SettingSpec, settings_schema};
use crate::logging::{StructuredLogger, get_logger};
use crate::mqtt::{ConnectionFlags, MqttPublisher};
use crate::store::{ConfigStore, RuntimeState};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub mod commands;
pub mod discovery;
pub mod snapshot;

/// Contract between the host plugin framework and its plugins
#[async_trait]
pub trait Plugin: Send {
    /// Called on the host's cadence; returns the amps this plugin requests
    /// (always 0.0 here - the bridge never drives charging current)
    async fn poll(&self) -> f64;

    /// Configuration options for the host settings UI
    fn settings_schema(&self) -> Vec<SettingSpec>;

    /// Tear down; must be safe to call even if never connected
    async fn shutdown(&mut self);
}

/// State shared between the poll hook and the MQTT event-loop task
pub(crate) struct BridgeCore {
    pub(crate) config: BridgeConfig,
    pub(crate) store: Arc<dyn ConfigStore>,
    pub(crate) runtime: Arc<dyn RuntimeState>,
    pub(crate) flags: ConnectionFlags,
    pub(crate) publisher: Arc<dyn MqttPublisher>,
    // Serializes discovery attempts from the connect handler and the poll hook
    discovery_gate: tokio::sync::Mutex<()>,
}

impl BridgeCore {
    /// Publish discovery once per connection; concurrent callers queue on the
    /// gate and find the sent flag already set.
    pub(crate) async fn send_discovery_guarded(&self) {
        let _guard = self.discovery_gate.lock().await;
        if !self.flags.is_connected() || self.flags.discovery_sent() {
            return;
        }
        discovery::publish_discovery(
            self.publisher.as_ref(),
            &self.config,
            self.runtime.as_ref(),
            &self.flags,
        )
        .await;
    }

    pub(crate) async fn publish_state(&self) {
        snapshot::publish_state(
            self.publisher.as_ref(),
            &self.config,
            self.store.as_ref(),
            self.runtime.as_ref(),
        )
        .await;
    }

    pub(crate) fn dispatch_command(&self, topic: &str, payload: &str) {
        commands::dispatch(
            &self.config.device_id,
            topic,
            payload,
            self.store.as_ref(),
            self.runtime.as_ref(),
        );
    }
}

/// Home Assistant MQTT bridge plugin
pub struct HaBridge {
    core: Option<Arc<BridgeCore>>,
    #[cfg(feature = "mqtt")]
    client: Option<rumqttc::AsyncClient>,
    event_task: Option<JoinHandle<()>>,
    logger: StructuredLogger,
}

impl HaBridge {
    /// Construct the bridge from the shared stores.
    ///
    /// Construction never fails: when the plugin is disabled in the config
    /// store, or the crate was built without MQTT support, the bridge comes
    /// up as a permanent no-op and `poll` returns immediately.
    pub fn new(store: Arc<dyn ConfigStore>, runtime: Arc<dyn RuntimeState>) -> Self {
        let logger = get_logger("bridge");
        let config = BridgeConfig::from_store(store.as_ref());

        if !config.enabled {
            logger.info("Home Assistant bridge disabled in configuration");
            return Self::disabled(logger);
        }

        #[cfg(not(feature = "mqtt"))]
        {
            let _ = runtime;
            logger.error("Built without MQTT support - Home Assistant bridge disabled");
            return Self::disabled(logger);
        }

        #[cfg(feature = "mqtt")]
        {
            logger.info(&format!(
                "Connecting to MQTT broker at {}:{}",
                config.mqtt_host, config.mqtt_port
            ));
            let (client, eventloop) = crate::mqtt::connect(&config);
            let publisher: Arc<dyn MqttPublisher> =
                Arc::new(crate::mqtt::RumqttcPublisher::new(client.clone()));
            let core = Arc::new(BridgeCore {
                config,
                store,
                runtime,
                flags: ConnectionFlags::new(),
                publisher,
                discovery_gate: tokio::sync::Mutex::new(()),
            });
            let event_task = crate::mqtt::spawn_event_loop(eventloop, Arc::clone(&core));
            Self {
                core: Some(core),
                client: Some(client),
                event_task: Some(event_task),
                logger,
            }
        }
    }

    /// Construct the bridge around an externally provided publisher.
    ///
    /// Used by tests and alternative transports; no event loop is spawned,
    /// so the caller owns the connection flags transitions.
    pub fn with_publisher(
        store: Arc<dyn ConfigStore>,
        runtime: Arc<dyn RuntimeState>,
        publisher: Arc<dyn MqttPublisher>,
    ) -> Self {
        let logger = get_logger("bridge");
        let config = BridgeConfig::from_store(store.as_ref());
        let core = Arc::new(BridgeCore {
            config,
            store,
            runtime,
            flags: ConnectionFlags::new(),
            publisher,
            discovery_gate: tokio::sync::Mutex::new(()),
        });
        Self {
            core: Some(core),
            #[cfg(feature = "mqtt")]
            client: None,
            event_task: None,
            logger,
        }
    }

    fn disabled(logger: StructuredLogger) -> Self {
        Self {
            core: None,
            #[cfg(feature = "mqtt")]
            client: None,
            event_task: None,
            logger,
        }
    }

    /// Whether the bridge was constructed as a no-op
    pub fn is_disabled(&self) -> bool {
        self.core.is_none()
    }

    /// Mark the connection up, as the event loop does on ConnAck.
    /// Exposed for hosts that manage the transport themselves.
    pub fn mark_connected(&self) {
        if let Some(core) = &self.core {
            core.flags.set_connected();
        }
    }

    /// Mark the connection down, resetting the discovery-sent flag.
    pub fn mark_disconnected(&self) {
        if let Some(core) = &self.core {
            core.flags.on_disconnect();
        }
    }

    /// Poll hook: discovery retry plus interval-gated state publication
    pub async fn poll(&self) -> f64 {
        let Some(core) = &self.core else {
            return 0.0;
        };

        if core.flags.is_connected() && !core.flags.discovery_sent() {
            let core = Arc::clone(core);
            tokio::spawn(async move {
                core.send_discovery_guarded().await;
            });
        }

        if core.flags.is_connected()
            && core
                .flags
                .due_for_publish(Duration::from_secs(core.config.publish_interval_secs))
        {
            core.publish_state().await;
            core.flags.mark_published();
        }

        0.0
    }

    /// Disconnect from the broker and stop the event loop
    pub async fn shutdown(&mut self) {
        #[cfg(feature = "mqtt")]
        if let Some(client) = self.client.take() {
            if let Err(e) = client.disconnect().await {
                self.logger.debug(&format!("Disconnect on shutdown failed: {}", e));
            }
        }
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        if self.core.take().is_some() {
            self.logger.info("Home Assistant bridge stopped");
        }
    }
}

#[async_trait]
impl Plugin for HaBridge {
    async fn poll(&self) -> f64 {
        HaBridge::poll(self).await
    }

    fn settings_schema(&self) -> Vec<SettingSpec> {
        settings_schema()
    }

    async fn shutdown(&mut self) {
        HaBridge::shutdown(self).await;
    }
}
