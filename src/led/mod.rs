//! LED ring output
//!
//! The dispatchers only see the [`LedSink`] capability. Concrete backends:
//! - [`PixelRing`]: ReSpeaker pixel ring commands over a [`RingTransport`]
//! - [`LedWorker`]: moves any sink onto a dedicated thread
//! - [`LogLed`]: logs commands, for hosts without the hardware

mod ring;
#[cfg(feature = "usb")]
mod usb;
mod worker;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

pub use ring::{PixelRing, RingCommand, RingTransport};
#[cfg(feature = "usb")]
pub use usb::UsbTransport;
pub use worker::LedWorker;

use crate::Result;

/// Default ring brightness (0x00 to 0x1F)
pub const DEFAULT_BRIGHTNESS: u8 = 0x0A;

/// Highest brightness the ring firmware accepts
pub const MAX_BRIGHTNESS: u8 = 0x1F;

/// Default two-colour palette (deep pink, medium violet red)
pub const DEFAULT_PALETTE: (u32, u32) = (0x00FF_1493, 0x00C7_1585);

/// How long the startup flash stays on
pub const BOOT_FLASH_HOLD: Duration = Duration::from_secs(3);

/// LED ring command surface
///
/// Every operation is fire-and-forget and idempotent: calling `off()` on a
/// ring that is already off is harmless. Hardware failures are logged by the
/// implementation, never returned.
pub trait LedSink: Send + Sync {
    /// Idle, all LEDs off
    fn off(&self);

    /// Thinking animation
    fn think(&self);

    /// Speaking pulse
    fn speak(&self);

    /// Spin animation
    fn spin(&self);

    /// Wake flash
    fn wakeup(&self);
}

/// LED backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LedBackend {
    /// ReSpeaker USB mic array
    Usb,
    /// Log commands only
    #[default]
    Log,
}

/// One-time ring configuration applied at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedConfig {
    /// Backend to drive
    pub backend: LedBackend,
    /// Ring brightness
    pub brightness: u8,
    /// Two-colour palette as `0xRRGGBB` values
    pub palette: (u32, u32),
    /// Show the startup flash
    pub boot_flash: bool,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            backend: LedBackend::default(),
            brightness: DEFAULT_BRIGHTNESS,
            palette: DEFAULT_PALETTE,
            boot_flash: true,
        }
    }
}

/// Sink that only logs the commands it receives
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLed;

impl LedSink for LogLed {
    fn off(&self) {
        tracing::info!(command = "off", "led");
    }

    fn think(&self) {
        tracing::info!(command = "think", "led");
    }

    fn speak(&self) {
        tracing::info!(command = "speak", "led");
    }

    fn spin(&self) {
        tracing::info!(command = "spin", "led");
    }

    fn wakeup(&self) {
        tracing::info!(command = "wakeup", "led");
    }
}

/// Open and configure the LED backend
///
/// # Errors
///
/// Returns error if the hardware cannot be opened or configured, or if the
/// USB backend was requested from a build without the `usb` feature
pub fn open(config: &LedConfig) -> Result<Arc<dyn LedSink>> {
    match config.backend {
        LedBackend::Log => {
            tracing::info!("using logging LED backend");
            Ok(Arc::new(LogLed))
        }
        LedBackend::Usb => open_usb(config),
    }
}

#[cfg(feature = "usb")]
fn open_usb(config: &LedConfig) -> Result<Arc<dyn LedSink>> {
    let ring = PixelRing::new(UsbTransport::open()?);
    ring.configure(config)?;
    tracing::info!(
        brightness = config.brightness,
        "ReSpeaker pixel ring configured"
    );
    Ok(Arc::new(LedWorker::spawn(ring)?))
}

#[cfg(not(feature = "usb"))]
fn open_usb(_config: &LedConfig) -> Result<Arc<dyn LedSink>> {
    Err(crate::Error::Config(
        "built without USB LED support (rebuild with `--features usb`)".to_string(),
    ))
}

/// Show the startup flash: think, hold, then off
///
/// The ring is turned off exactly once whether the hold runs out or
/// `shutdown` completes first. Returns `false` if it was cut short.
pub async fn boot_flash(
    led: &dyn LedSink,
    hold: Duration,
    shutdown: impl Future<Output = ()>,
) -> bool {
    led.think();
    let completed = tokio::select! {
        () = tokio::time::sleep(hold) => true,
        () = shutdown => false,
    };
    led.off();
    completed
}
