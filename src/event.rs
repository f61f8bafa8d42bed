//! Satellite lifecycle events
//!
//! A [`LifecycleEvent`] is the only thing the dispatchers consume. It is built
//! from a raw Wyoming event whose type belongs to the closed [`EventKind`]
//! enumeration; any other type is dropped before dispatch.

use std::fmt;

use serde_json::{Map, Value};

use crate::wyoming::WyomingEvent;

/// Kind of satellite lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Wake word detected
    WakeDetected,
    /// Voice activity started
    VoiceStarted,
    /// Voice activity stopped
    VoiceStopped,
    /// Satellite started streaming audio to the server
    StreamingStarted,
    /// Satellite stopped streaming audio
    StreamingStopped,
    /// Satellite connected to the server
    SatelliteConnected,
    /// Satellite disconnected from the server
    SatelliteDisconnected,
    /// Response audio finished playing
    PlaybackFinished,
}

impl EventKind {
    /// Every kind, in protocol order
    pub const ALL: [Self; 8] = [
        Self::WakeDetected,
        Self::VoiceStarted,
        Self::VoiceStopped,
        Self::StreamingStarted,
        Self::StreamingStopped,
        Self::SatelliteConnected,
        Self::SatelliteDisconnected,
        Self::PlaybackFinished,
    ];

    /// Parse from a Wyoming event type like `"voice-started"`
    #[must_use]
    pub fn from_type(event_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_type() == event_type)
    }

    /// Wyoming event type string
    #[must_use]
    pub const fn as_type(self) -> &'static str {
        match self {
            Self::WakeDetected => "detection",
            Self::VoiceStarted => "voice-started",
            Self::VoiceStopped => "voice-stopped",
            Self::StreamingStarted => "streaming-started",
            Self::StreamingStopped => "streaming-stopped",
            Self::SatelliteConnected => "satellite-connected",
            Self::SatelliteDisconnected => "satellite-disconnected",
            Self::PlaybackFinished => "played",
        }
    }

    /// Last MQTT topic segment used for this kind
    #[must_use]
    pub const fn topic_suffix(self) -> &'static str {
        match self {
            Self::WakeDetected => "detection",
            Self::VoiceStarted => "voice_started",
            Self::VoiceStopped => "voice_stopped",
            Self::StreamingStarted => "streaming_started",
            Self::StreamingStopped => "streaming_stopped",
            Self::SatelliteConnected => "connected",
            Self::SatelliteDisconnected => "disconnected",
            Self::PlaybackFinished => "played",
        }
    }

    /// Parse from an MQTT topic segment like `"voice_started"`
    #[must_use]
    pub fn from_topic_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.topic_suffix() == suffix)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_type())
    }
}

/// A lifecycle event reported by a satellite
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    /// Event kind
    pub kind: EventKind,
    /// Event data, passed through untouched to MQTT
    pub data: Value,
}

impl LifecycleEvent {
    /// Create an event with data
    #[must_use]
    pub const fn new(kind: EventKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// Create an event with an empty data object
    #[must_use]
    pub fn bare(kind: EventKind) -> Self {
        Self::new(kind, Value::Object(Map::new()))
    }

    /// Classify a raw Wyoming event
    ///
    /// Returns `None` for event types outside [`EventKind`], which keeps the
    /// dispatchers working against producers that add new types.
    #[must_use]
    pub fn from_wyoming(event: &WyomingEvent) -> Option<Self> {
        let kind = EventKind::from_type(&event.event_type)?;
        Some(Self::new(kind, Value::Object(event.data.clone())))
    }
}
