//! Event dispatchers
//!
//! Each dispatcher turns one incoming event into at most one sink call:
//! - [`LedDispatcher`]: direct mode, events straight to the LED ring
//! - [`SubscriberDispatcher`]: MQTT messages, filtered by satellite identity
//! - [`PublishDispatcher`]: events to MQTT, tagged with the local identity
//!
//! Callers serialize calls; dispatchers are not re-entrant.

use std::sync::Arc;
use std::time::Duration;

use crate::action::{LedAction, action_for, reverts_to_idle};
use crate::bridge::{BridgeMessage, MessageSink, TopicScheme};
use crate::event::{EventKind, LifecycleEvent};
use crate::identity::{SatelliteId, accepts};
use crate::led::LedSink;
use crate::revert::DelayedRevert;

/// Maps lifecycle events to LED actions
pub struct LedDispatcher {
    revert: DelayedRevert,
}

impl LedDispatcher {
    /// Create a dispatcher driving `led`
    #[must_use]
    pub fn new(led: Arc<dyn LedSink>, revert_delay: Duration) -> Self {
        Self {
            revert: DelayedRevert::new(led, revert_delay),
        }
    }

    /// Handle one event
    pub fn on_event(&mut self, event: &LifecycleEvent) -> Option<LedAction> {
        self.dispatch(event.kind)
    }

    /// Apply the mapped action for `kind`
    ///
    /// Returns the action taken, or `None` when the kind has no visual change.
    pub fn dispatch(&mut self, kind: EventKind) -> Option<LedAction> {
        let Some(action) = action_for(kind) else {
            tracing::trace!(event = %kind, "no LED change");
            return None;
        };

        tracing::debug!(event = %kind, %action, "dispatching");
        self.revert.apply(action, reverts_to_idle(kind));
        Some(action)
    }

    /// Whether a revert to idle is pending
    #[must_use]
    pub fn is_revert_pending(&self) -> bool {
        self.revert.is_pending()
    }

    /// Cancel any pending revert and turn the LEDs off
    pub fn shutdown(self) {
        tracing::debug!("turning LEDs off");
        self.revert.finish();
    }
}

/// Drives LEDs from bridge messages addressed to one satellite
pub struct SubscriberDispatcher {
    inner: LedDispatcher,
    satellite_id: SatelliteId,
    topics: TopicScheme,
}

impl SubscriberDispatcher {
    /// Create a dispatcher accepting messages for `satellite_id`
    #[must_use]
    pub fn new(
        led: Arc<dyn LedSink>,
        revert_delay: Duration,
        satellite_id: SatelliteId,
        topics: TopicScheme,
    ) -> Self {
        Self {
            inner: LedDispatcher::new(led, revert_delay),
            satellite_id,
            topics,
        }
    }

    /// Handle one received MQTT message
    ///
    /// Messages on unrelated topics, undecodable payloads and messages for
    /// other satellites are dropped without touching the LEDs.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) -> Option<LedAction> {
        let Some(kind) = self.topics.kind_for(topic) else {
            tracing::trace!(topic, "ignoring unrelated topic");
            return None;
        };

        let message = match BridgeMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(topic, error = %e, "discarding undecodable message");
                return None;
            }
        };

        if !accepts(&self.satellite_id, &message.satellite_id) {
            tracing::trace!(
                topic,
                satellite = %message.satellite_id,
                "message for another satellite"
            );
            return None;
        }

        self.inner.dispatch(kind)
    }

    /// Topic layout this dispatcher listens on
    #[must_use]
    pub const fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    /// Configured satellite identity
    #[must_use]
    pub const fn satellite_id(&self) -> &SatelliteId {
        &self.satellite_id
    }

    /// Whether a revert to idle is pending
    #[must_use]
    pub fn is_revert_pending(&self) -> bool {
        self.inner.is_revert_pending()
    }

    /// Cancel any pending revert and turn the LEDs off
    pub fn shutdown(self) {
        self.inner.shutdown();
    }
}

/// Publishes lifecycle events to the bridge topics
pub struct PublishDispatcher {
    sink: Arc<dyn MessageSink>,
    satellite_id: SatelliteId,
    topics: TopicScheme,
}

impl PublishDispatcher {
    /// Create a publisher tagging events with `satellite_id`
    #[must_use]
    pub fn new(sink: Arc<dyn MessageSink>, satellite_id: SatelliteId, topics: TopicScheme) -> Self {
        Self {
            sink,
            satellite_id,
            topics,
        }
    }

    /// Publish one event
    pub fn on_event(&self, event: &LifecycleEvent) {
        let topic = self.topics.topic_for(event.kind);
        let payload = match BridgeMessage::new(self.satellite_id.clone(), event).encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(event = %event.kind, error = %e, "failed to encode event");
                return;
            }
        };

        tracing::debug!(%topic, event = %event.kind, "publishing");
        self.sink.publish(&topic, payload);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Calls(Mutex<Vec<LedAction>>);

    impl LedSink for Calls {
        fn off(&self) {
            self.0.lock().unwrap().push(LedAction::Off);
        }
        fn think(&self) {
            self.0.lock().unwrap().push(LedAction::Think);
        }
        fn speak(&self) {
            self.0.lock().unwrap().push(LedAction::Speak);
        }
        fn spin(&self) {
            self.0.lock().unwrap().push(LedAction::Spin);
        }
        fn wakeup(&self) {
            self.0.lock().unwrap().push(LedAction::Wakeup);
        }
    }

    #[tokio::test]
    async fn dispatch_returns_action_taken() {
        let led = Arc::new(Calls::default());
        let mut dispatcher = LedDispatcher::new(led.clone(), Duration::from_secs(2));

        assert_eq!(
            dispatcher.dispatch(EventKind::VoiceStopped),
            Some(LedAction::Spin)
        );
        assert_eq!(dispatcher.dispatch(EventKind::StreamingStarted), None);
        assert_eq!(*led.0.lock().unwrap(), vec![LedAction::Spin]);
    }

    #[tokio::test]
    async fn terminal_event_clears_pending_revert() {
        let led = Arc::new(Calls::default());
        let mut dispatcher = LedDispatcher::new(led, Duration::from_secs(2));

        dispatcher.dispatch(EventKind::SatelliteConnected);
        assert!(dispatcher.is_revert_pending());

        dispatcher.dispatch(EventKind::SatelliteDisconnected);
        assert!(!dispatcher.is_revert_pending());
    }

    #[tokio::test]
    async fn subscriber_ignores_unrelated_topic_before_decoding() {
        let led = Arc::new(Calls::default());
        let mut dispatcher = SubscriberDispatcher::new(
            led.clone(),
            Duration::from_secs(2),
            SatelliteId::new("kitchen").unwrap(),
            TopicScheme::default(),
        );

        assert_eq!(dispatcher.on_message("zigbee2mqtt/lamp", b"{}"), None);
        assert!(led.0.lock().unwrap().is_empty());
    }
}
