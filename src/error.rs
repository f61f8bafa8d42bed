//! Error types for satellite tools

use thiserror::Error;

/// Result type alias for satellite tools operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bridging satellite events
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Event source or broker connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Received message does not match the expected schema
    #[error("decode error: {0}")]
    Decode(String),

    /// LED hardware error
    #[error("led error: {0}")]
    Led(String),

    /// MQTT client error
    #[error("mqtt error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the error only affects a single message
    ///
    /// Decode errors are discarded by the caller; everything else ends the
    /// connection that produced it.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
