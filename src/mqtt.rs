//! MQTT connection management for Eobridge
//!
//! Owns the rumqttc client and its background event loop. Connect,
//! disconnect and inbound command messages arrive on the event-loop task
//! concurrently with the host's poll calls, so all shared connection state
//! lives in [`ConnectionFlags`] behind atomics and a mutex.
//!
//! The [`MqttPublisher`] trait is the seam between the bridge logic and the
//! transport: production code wires in [`RumqttcPublisher`], tests substitute
//! a recording fake.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "mqtt")]
use crate::bridge::BridgeCore;
#[cfg(feature = "mqtt")]
use crate::bridge::commands;
#[cfg(feature = "mqtt")]
use crate::config::BridgeConfig;
#[cfg(feature = "mqtt")]
use crate::logging::{StructuredLogger, get_logger};
#[cfg(feature = "mqtt")]
use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
};
#[cfg(feature = "mqtt")]
use std::sync::Arc;

/// Minimal publish/subscribe surface the bridge needs from an MQTT client
#[async_trait]
pub trait MqttPublisher: Send + Sync {
    /// Publish a text payload to `topic` with the given retain flag
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()>;

    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str) -> Result<()>;
}

/// Connection state shared between the event-loop task and the poll hook
#[derive(Debug, Default)]
pub struct ConnectionFlags {
    connected: AtomicBool,
    discovery_sent: AtomicBool,
    last_publish: Mutex<Option<Instant>>,
}

impl ConnectionFlags {
    /// Create flags in the disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the broker connection is currently up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Record a successful connection
    pub fn set_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Record a disconnect: reconnection must re-trigger discovery
    pub fn on_disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.discovery_sent.store(false, Ordering::SeqCst);
    }

    /// Whether discovery was already published on this connection
    pub fn discovery_sent(&self) -> bool {
        self.discovery_sent.load(Ordering::SeqCst)
    }

    /// Record that discovery publication completed
    pub fn mark_discovery_sent(&self) {
        self.discovery_sent.store(true, Ordering::SeqCst);
    }

    /// Whether the publish interval has elapsed since the last state publish
    pub fn due_for_publish(&self, interval: Duration) -> bool {
        match self.last_publish.lock() {
            Ok(last) => match *last {
                Some(at) => at.elapsed() >= interval,
                None => true,
            },
            Err(_) => false,
        }
    }

    /// Stamp the last state publish time
    pub fn mark_published(&self) {
        if let Ok(mut last) = self.last_publish.lock() {
            *last = Some(Instant::now());
        }
    }
}

/// [`MqttPublisher`] backed by a rumqttc async client
#[cfg(feature = "mqtt")]
#[derive(Debug, Clone)]
pub struct RumqttcPublisher {
    client: AsyncClient,
}

#[cfg(feature = "mqtt")]
impl RumqttcPublisher {
    /// Wrap an async client handle
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[cfg(feature = "mqtt")]
#[async_trait]
impl MqttPublisher for RumqttcPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, retain, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }
}

/// Build the client and event loop for the configured broker.
///
/// The connection itself is established lazily by the event loop; failures
/// surface there and are logged, never returned to the caller.
#[cfg(feature = "mqtt")]
pub fn connect(config: &BridgeConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(
        config.device_id.clone(),
        config.mqtt_host.clone(),
        config.mqtt_port,
    );
    options.set_keep_alive(Duration::from_secs(60));
    if !config.mqtt_username.is_empty() {
        options.set_credentials(&config.mqtt_username, &config.mqtt_password);
    }

    AsyncClient::new(options, 64)
}

/// Drive the MQTT event loop on a background task.
///
/// Reconnect pacing is rumqttc's job; this loop only reacts to events and
/// keeps the shared flags coherent.
#[cfg(feature = "mqtt")]
pub(crate) fn spawn_event_loop(
    mut eventloop: EventLoop,
    core: Arc<BridgeCore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let logger = get_logger("mqtt");
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    on_conn_ack(&core, &ack, &logger).await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match std::str::from_utf8(&publish.payload) {
                        Ok(payload) => core.dispatch_command(&publish.topic, payload.trim()),
                        Err(e) => logger.error(&format!(
                            "Non-UTF-8 payload on {}: {}",
                            publish.topic, e
                        )),
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    core.flags.on_disconnect();
                    logger.info("Disconnected from MQTT broker");
                }
                Ok(_) => {}
                Err(e) => {
                    core.flags.on_disconnect();
                    logger.warn(&format!("MQTT connection error: {}", e));
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

#[cfg(feature = "mqtt")]
async fn on_conn_ack(core: &Arc<BridgeCore>, ack: &ConnAck, logger: &StructuredLogger) {
    if ack.code != ConnectReturnCode::Success {
        logger.error(&format!(
            "Failed to connect to MQTT broker, return code {:?}",
            ack.code
        ));
        return;
    }

    core.flags.set_connected();
    logger.info("Connected to MQTT broker");

    // Re-subscribe on every (re)connect; the broker may have dropped the session
    for topic in commands::command_topics(&core.config.device_id) {
        match core.publisher.subscribe(&topic).await {
            Ok(()) => logger.info(&format!("Subscribed to command topic: {}", topic)),
            Err(e) => logger.error(&format!("Failed to subscribe to {}: {}", topic, e)),
        }
    }

    // Discovery runs on its own task so the event loop is never stalled
    let core = Arc::clone(core);
    tokio::spawn(async move {
        core.send_discovery_guarded().await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_disconnected() {
        let flags = ConnectionFlags::new();
        assert!(!flags.is_connected());
        assert!(!flags.discovery_sent());
    }

    #[test]
    fn test_disconnect_resets_discovery() {
        let flags = ConnectionFlags::new();
        flags.set_connected();
        flags.mark_discovery_sent();
        assert!(flags.is_connected());
        assert!(flags.discovery_sent());

        flags.on_disconnect();
        assert!(!flags.is_connected());
        assert!(!flags.discovery_sent());
    }

    #[test]
    fn test_first_publish_is_always_due() {
        let flags = ConnectionFlags::new();
        assert!(flags.due_for_publish(Duration::from_secs(5)));

        flags.mark_published();
        assert!(!flags.due_for_publish(Duration::from_secs(5)));
        assert!(flags.due_for_publish(Duration::from_millis(0)));
    }
}
