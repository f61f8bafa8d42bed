//! Event to LED action mapping

use std::fmt;

use crate::event::EventKind;
use crate::led::LedSink;

/// A single LED ring command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedAction {
    /// Turn the ring off (idle)
    Off,
    /// Thinking spin
    Think,
    /// Speaking pulse
    Speak,
    /// Spin
    Spin,
    /// Wake flash
    Wakeup,
}

impl LedAction {
    /// Invoke the matching sink operation
    pub fn apply(self, led: &dyn LedSink) {
        match self {
            Self::Off => led.off(),
            Self::Think => led.think(),
            Self::Speak => led.speak(),
            Self::Spin => led.spin(),
            Self::Wakeup => led.wakeup(),
        }
    }

    /// Convert to string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Think => "think",
            Self::Speak => "speak",
            Self::Spin => "spin",
            Self::Wakeup => "wakeup",
        }
    }
}

impl fmt::Display for LedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LED action shown for an event kind, if any
#[must_use]
pub const fn action_for(kind: EventKind) -> Option<LedAction> {
    match kind {
        EventKind::WakeDetected => Some(LedAction::Wakeup),
        EventKind::VoiceStarted => Some(LedAction::Speak),
        EventKind::VoiceStopped => Some(LedAction::Spin),
        EventKind::StreamingStarted => None,
        EventKind::StreamingStopped
        | EventKind::SatelliteDisconnected
        | EventKind::PlaybackFinished => Some(LedAction::Off),
        EventKind::SatelliteConnected => Some(LedAction::Think),
    }
}

/// Whether the action for `kind` is a short announcement that falls back to idle
#[must_use]
pub const fn reverts_to_idle(kind: EventKind) -> bool {
    matches!(kind, EventKind::SatelliteConnected)
}
