//! MQTT bridge tests
//!
//! Publisher output is captured by a recording sink and replayed into
//! subscriber dispatchers, standing in for the broker.

use std::sync::Arc;
use std::time::Duration;

use satellite_tools::{
    BridgeMessage, EventKind, LedSink, LifecycleEvent, MessageSink, PublishDispatcher,
    SubscriberDispatcher, TopicScheme,
};
use serde_json::json;

mod common;
use common::{RecordingLed, RecordingSink, id};

const DELAY: Duration = Duration::from_secs(2);

fn subscriber(name: &str, led: &Arc<RecordingLed>) -> SubscriberDispatcher {
    let sink: Arc<dyn LedSink> = led.clone();
    SubscriberDispatcher::new(sink, DELAY, id(name), TopicScheme::default())
}

fn publisher(name: &str, sink: &Arc<RecordingSink>) -> PublishDispatcher {
    let sink: Arc<dyn MessageSink> = sink.clone();
    PublishDispatcher::new(sink, id(name), TopicScheme::default())
}

#[tokio::test(start_paused = true)]
async fn messages_reach_only_the_named_satellite() {
    let broker = RecordingSink::shared();
    let kitchen_led = RecordingLed::shared();
    let living_room_led = RecordingLed::shared();
    let mut kitchen = subscriber("kitchen", &kitchen_led);
    let mut living_room = subscriber("living_room", &living_room_led);

    publisher("kitchen", &broker).on_event(&LifecycleEvent::bare(EventKind::VoiceStarted));

    for (topic, payload) in broker.messages() {
        kitchen.on_message(&topic, &payload);
        living_room.on_message(&topic, &payload);
    }

    assert_eq!(kitchen_led.calls(), vec!["speak"]);
    assert!(living_room_led.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn published_message_shape() {
    let broker = RecordingSink::shared();
    let event = LifecycleEvent::new(EventKind::WakeDetected, json!({"name": "ok_nabu"}));

    publisher("kitchen", &broker).on_event(&event);

    let messages = broker.messages();
    assert_eq!(messages.len(), 1);
    let (topic, payload) = &messages[0];
    assert_eq!(topic, "wyoming-satellite/detection");

    let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
    assert_eq!(
        value,
        json!({"satelliteId": "kitchen", "event": "detection", "data": {"name": "ok_nabu"}})
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_is_discarded() {
    let led = RecordingLed::shared();
    let mut kitchen = subscriber("kitchen", &led);
    let topic = TopicScheme::default().topic_for(EventKind::VoiceStarted);

    assert_eq!(kitchen.on_message(&topic, b"{not json"), None);
    assert_eq!(kitchen.on_message(&topic, br#"{"event":"voice-started"}"#), None);
    assert_eq!(kitchen.on_message(&topic, br#"{"satelliteId":7}"#), None);
    assert!(led.calls().is_empty());

    // The next valid message still goes through
    let payload = BridgeMessage::new(id("kitchen"), &LifecycleEvent::bare(EventKind::VoiceStarted))
        .encode()
        .unwrap();
    kitchen.on_message(&topic, &payload);
    assert_eq!(led.calls(), vec!["speak"]);
}

#[tokio::test(start_paused = true)]
async fn identity_match_is_exact() {
    let led = RecordingLed::shared();
    let mut kitchen = subscriber("kitchen", &led);
    let topic = TopicScheme::default().topic_for(EventKind::VoiceStopped);

    for other in ["Kitchen", "kitchen ", "kitchen2", ""] {
        let payload = json!({"satelliteId": other, "event": "voice-stopped"}).to_string();
        kitchen.on_message(&topic, payload.as_bytes());
    }
    assert!(led.calls().is_empty());

    let payload = json!({"satelliteId": "kitchen"}).to_string();
    kitchen.on_message(&topic, payload.as_bytes());
    assert_eq!(led.calls(), vec!["spin"]);
}

#[tokio::test(start_paused = true)]
async fn foreign_topics_are_ignored() {
    let led = RecordingLed::shared();
    let mut kitchen = subscriber("kitchen", &led);
    let payload = json!({"satelliteId": "kitchen"}).to_string();

    kitchen.on_message("other-prefix/voice_started", payload.as_bytes());
    kitchen.on_message("wyoming-satellite/unknown", payload.as_bytes());
    kitchen.on_message("wyoming-satellite/voice_started/extra", payload.as_bytes());

    assert!(led.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bridged_connect_reverts_to_off() {
    let broker = RecordingSink::shared();
    let led = RecordingLed::shared();
    let mut kitchen = subscriber("kitchen", &led);

    publisher("kitchen", &broker).on_event(&LifecycleEvent::bare(EventKind::SatelliteConnected));
    for (topic, payload) in broker.messages() {
        kitchen.on_message(&topic, &payload);
    }
    assert!(kitchen.is_revert_pending());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(led.calls(), vec!["think", "off"]);

    kitchen.shutdown();
    assert_eq!(led.calls(), vec!["think", "off", "off"]);
}
