//! MQTT bridge schema
//!
//! One topic per event kind under a shared prefix, e.g.
//! `wyoming-satellite/voice_started`. Every payload is a JSON object tagged
//! with the producing satellite so several satellites can share a broker:
//!
//! ```json
//! {"satelliteId": "kitchen", "event": "voice-started", "data": {}}
//! ```
//!
//! Subscribers listen on `<prefix>/+` and take the kind from the topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{EventKind, LifecycleEvent};
use crate::identity::SatelliteId;
use crate::{Error, Result};

/// Default topic prefix
pub const DEFAULT_TOPIC_PREFIX: &str = "wyoming-satellite";

/// Outbound message capability
///
/// Delivery is at-most-once and best effort; implementations log failures
/// and never block the caller on an acknowledgement.
pub trait MessageSink: Send + Sync {
    /// Publish `payload` on `topic`
    fn publish(&self, topic: &str, payload: Vec<u8>);
}

/// Payload carried on every bridge topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMessage {
    /// Satellite that produced the event
    pub satellite_id: SatelliteId,
    /// Wyoming event type
    #[serde(default)]
    pub event: String,
    /// Event data
    #[serde(default)]
    pub data: Value,
}

impl BridgeMessage {
    /// Tag an event with the producing satellite
    #[must_use]
    pub fn new(satellite_id: SatelliteId, event: &LifecycleEvent) -> Self {
        Self {
            satellite_id,
            event: event.kind.as_type().to_string(),
            data: event.data.clone(),
        }
    }

    /// Decode a received payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload is not a JSON object with a
    /// string `satelliteId`
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Encode for publishing
    ///
    /// # Errors
    ///
    /// Returns error if the data cannot be serialized
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Topic layout under a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    /// Create a scheme; trailing slashes on the prefix are ignored
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Topic prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Topic an event kind is published on
    #[must_use]
    pub fn topic_for(&self, kind: EventKind) -> String {
        format!("{}/{}", self.prefix, kind.topic_suffix())
    }

    /// Subscription filter matching every kind
    #[must_use]
    pub fn filter(&self) -> String {
        format!("{}/+", self.prefix)
    }

    /// Event kind carried on `topic`, if it belongs to this scheme
    #[must_use]
    pub fn kind_for(&self, topic: &str) -> Option<EventKind> {
        let suffix = topic.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        EventKind::from_topic_suffix(suffix)
    }
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}
