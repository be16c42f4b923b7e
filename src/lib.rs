//! # Eobridge - Home Assistant MQTT bridge for OpenEO EV chargers
//!
//! Publishes OpenEO charger state to Home Assistant over MQTT with
//! auto-discovery, and accepts remote commands (switch, current limit,
//! operating mode, plugin enable) that mutate the charger's shared
//! configuration store.
//!
//! ## Features
//!
//! - **Auto-discovery**: retained Home Assistant discovery documents for a
//!   fixed catalog of 15 entities, republished once per connection
//! - **Periodic state**: interval-gated JSON snapshots on a single state topic
//! - **Remote control**: validated command handling with an allow-list for
//!   remotely switchable plugins
//! - **Resilient by construction**: no command or publish failure ever
//!   escapes the event loop or the poll hook
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: bridge settings snapshot and host configuration file
//! - `logging`: structured logging and tracing
//! - `store`: injected interfaces over the host's shared config/telemetry stores
//! - `mqtt`: connection management and the publisher seam
//! - `bridge`: the plugin facade, command dispatch, discovery and state publishing

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod mqtt;
pub mod store;

// Re-export commonly used types
pub use bridge::{HaBridge, Plugin};
pub use config::{AppConfig, BridgeConfig};
pub use error::{BridgeError, Result};
