//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use satellite_tools::{LedSink, MessageSink, SatelliteId};

/// LED sink recording every command in order
#[derive(Default)]
pub struct RecordingLed {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingLed {
    /// Create a shared recorder
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Commands received so far
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Most recent command
    pub fn last(&self) -> Option<&'static str> {
        self.calls.lock().unwrap().last().copied()
    }

    /// Number of times `command` was received
    pub fn count(&self, command: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == command)
            .count()
    }

    fn record(&self, command: &'static str) {
        self.calls.lock().unwrap().push(command);
    }
}

impl LedSink for RecordingLed {
    fn off(&self) {
        self.record("off");
    }

    fn think(&self) {
        self.record("think");
    }

    fn speak(&self) {
        self.record("speak");
    }

    fn spin(&self) {
        self.record("spin");
    }

    fn wakeup(&self) {
        self.record("wakeup");
    }
}

/// Message sink recording every publish
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingSink {
    /// Create a shared recorder
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Published `(topic, payload)` pairs
    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessageSink for RecordingSink {
    fn publish(&self, topic: &str, payload: Vec<u8>) {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
    }
}

/// Build a satellite id
pub fn id(name: &str) -> SatelliteId {
    SatelliteId::new(name).expect("valid satellite id")
}
