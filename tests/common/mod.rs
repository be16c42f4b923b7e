use async_trait::async_trait;
use eobridge::error::{BridgeError, Result};
use eobridge::mqtt::MqttPublisher;
use std::sync::Mutex;

/// Recorded publish: (topic, payload, retain)
pub type Published = (String, String, bool);

/// In-memory MQTT publisher capturing everything the bridge sends
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Published>>,
    subscribed: Mutex<Vec<String>>,
    fail_substrings: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force publish failures for any topic containing `fragment`
    #[allow(dead_code)]
    pub fn fail_topics_containing(&self, fragment: &str) {
        if let Ok(mut fragments) = self.fail_substrings.lock() {
            fragments.push(fragment.to_string());
        }
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    #[allow(dead_code)]
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MqttPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        let failing = self
            .fail_substrings
            .lock()
            .map(|f| f.iter().any(|fragment| topic.contains(fragment.as_str())))
            .unwrap_or(false);
        if failing {
            return Err(BridgeError::mqtt(format!("forced failure for {}", topic)));
        }
        if let Ok(mut published) = self.published.lock() {
            published.push((topic.to_string(), payload.to_string(), retain));
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        if let Ok(mut subscribed) = self.subscribed.lock() {
            subscribed.push(topic.to_string());
        }
        Ok(())
    }
}
