//! Satellite Tools - LED feedback and MQTT bridging for voice satellites
//!
//! This library turns voice-satellite lifecycle events into LED ring
//! animations, either directly or across an MQTT bridge:
//! - Wyoming event server accepting satellite `--event-uri` connections
//! - Event to LED action mapping with a delayed revert to idle
//! - MQTT publisher and identity-filtered subscriber
//! - ReSpeaker pixel ring driver
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   Wyoming    ┌─────────────────────────────────────┐
//! │  Satellite   ├─────────────►│ EventServer ─► LedDispatcher ─► LED │  leds
//! └──────────────┘              │             ─► PublishDispatcher    │  publish
//!                               └───────────────────────┬─────────────┘
//!                                                       │ MQTT
//!                               ┌───────────────────────▼─────────────┐
//!                               │ SubscriberDispatcher ─► LED         │  subscribe
//!                               └─────────────────────────────────────┘
//! ```

pub mod action;
pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod identity;
pub mod led;
pub mod mqtt;
pub mod revert;
pub mod server;
pub mod shutdown;
pub mod wyoming;

pub use action::LedAction;
pub use bridge::{BridgeMessage, MessageSink, TopicScheme};
pub use config::Config;
pub use dispatcher::{LedDispatcher, PublishDispatcher, SubscriberDispatcher};
pub use error::{Error, Result};
pub use event::{EventKind, LifecycleEvent};
pub use identity::{SatelliteId, accepts};
pub use led::LedSink;
