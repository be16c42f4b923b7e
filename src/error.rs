//! Error types and handling for Eobridge
//!
//! This module defines the error types used throughout the crate,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Eobridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for Eobridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// MQTT client errors (publish, subscribe, disconnect)
    #[error("MQTT error: {message}")]
    Mqtt { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl BridgeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        BridgeError::Config {
            message: message.into(),
        }
    }

    /// Create a new MQTT error
    pub fn mqtt<S: Into<String>>(message: S) -> Self {
        BridgeError::Mqtt {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        BridgeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        BridgeError::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        BridgeError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        BridgeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ClientError> for BridgeError {
    fn from(err: rumqttc::ClientError) -> Self {
        BridgeError::mqtt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BridgeError::config("test config error");
        assert!(matches!(err, BridgeError::Config { .. }));

        let err = BridgeError::mqtt("test mqtt error");
        assert!(matches!(err, BridgeError::Mqtt { .. }));

        let err = BridgeError::validation("field", "test validation error");
        assert!(matches!(err, BridgeError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = BridgeError::validation("test_field", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: test_field - invalid value");
    }
}
