//! ReSpeaker pixel ring command set
//!
//! The mic array firmware takes vendor commands identified by a 16-bit value
//! plus a short data block. Colours are sent as `[r, g, b, 0]`.

use std::sync::{Mutex, PoisonError};

use super::{LedConfig, LedSink};
use crate::Result;

/// Writes raw ring commands to the device
pub trait RingTransport: Send {
    /// Send one command with its data block
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects or drops the write
    fn write(&mut self, command: u16, data: &[u8]) -> Result<()>;
}

/// Pixel ring firmware command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingCommand {
    /// Solid colour on every LED; black turns the ring off
    Mono(u32),
    /// Listening / wake animation
    Listen,
    /// Speaking animation
    Speak,
    /// Thinking animation
    Think,
    /// Spin animation
    Spin,
    /// Global brightness
    Brightness(u8),
    /// Two-colour palette used by the animations
    Palette(u32, u32),
    /// Voice activity LED in the centre of the ring
    VadLed(u8),
}

impl RingCommand {
    /// Firmware command value and data block
    #[must_use]
    pub fn encode(self) -> (u16, Vec<u8>) {
        match self {
            Self::Mono(color) => (1, rgb0(color).to_vec()),
            Self::Listen => (2, vec![0]),
            Self::Speak => (3, vec![0]),
            Self::Think => (4, vec![0]),
            Self::Spin => (5, vec![0]),
            Self::Brightness(level) => (0x20, vec![level]),
            Self::Palette(a, b) => {
                let mut data = rgb0(a).to_vec();
                data.extend_from_slice(&rgb0(b));
                (0x21, data)
            }
            Self::VadLed(state) => (0x22, vec![state]),
        }
    }
}

fn rgb0(color: u32) -> [u8; 4] {
    let [_, r, g, b] = color.to_be_bytes();
    [r, g, b, 0]
}

/// ReSpeaker pixel ring driven through a transport
pub struct PixelRing<T> {
    transport: Mutex<T>,
}

impl<T: RingTransport> PixelRing<T> {
    /// Wrap a transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
        }
    }

    /// Send a single command
    ///
    /// # Errors
    ///
    /// Returns error if the transport write fails
    pub fn send(&self, command: RingCommand) -> Result<()> {
        let (value, data) = command.encode();
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(value, &data)
    }

    /// Apply startup configuration: VAD LED off, brightness, palette
    ///
    /// # Errors
    ///
    /// Returns error if any configuration write fails
    pub fn configure(&self, config: &LedConfig) -> Result<()> {
        self.send(RingCommand::VadLed(0))?;
        self.send(RingCommand::Brightness(config.brightness))?;
        let (a, b) = config.palette;
        self.send(RingCommand::Palette(a, b))
    }

    fn send_logged(&self, command: RingCommand) {
        if let Err(e) = self.send(command) {
            tracing::warn!(?command, error = %e, "pixel ring write failed");
        }
    }
}

impl<T: RingTransport> LedSink for PixelRing<T> {
    fn off(&self) {
        self.send_logged(RingCommand::Mono(0));
    }

    fn think(&self) {
        self.send_logged(RingCommand::Think);
    }

    fn speak(&self) {
        self.send_logged(RingCommand::Speak);
    }

    fn spin(&self) {
        self.send_logged(RingCommand::Spin);
    }

    fn wakeup(&self) {
        self.send_logged(RingCommand::Listen);
    }
}
