//! USB transport for the ReSpeaker mic array v2.0

use std::time::Duration;

use rusb::{DeviceHandle, Direction, GlobalContext, Recipient, RequestType};

use super::RingTransport;
use crate::{Error, Result};

/// ReSpeaker (Seeed) USB vendor ID
pub const VENDOR_ID: u16 = 0x2886;

/// Mic array v2.0 product ID
pub const PRODUCT_ID: u16 = 0x0018;

/// Control transfer index addressing the LED controller
const LED_INDEX: u16 = 0x1C;

const WRITE_TIMEOUT: Duration = Duration::from_secs(8);

/// Vendor control transfers to the mic array
pub struct UsbTransport {
    handle: DeviceHandle<GlobalContext>,
}

impl UsbTransport {
    /// Open the first attached mic array
    ///
    /// # Errors
    ///
    /// Returns error if no device is attached or it cannot be opened
    pub fn open() -> Result<Self> {
        let handle = rusb::open_device_with_vid_pid(VENDOR_ID, PRODUCT_ID).ok_or_else(|| {
            Error::Led(format!(
                "ReSpeaker mic array {VENDOR_ID:04x}:{PRODUCT_ID:04x} not found or not accessible"
            ))
        })?;

        tracing::debug!(
            vendor = VENDOR_ID,
            product = PRODUCT_ID,
            "opened ReSpeaker mic array"
        );

        Ok(Self { handle })
    }
}

impl RingTransport for UsbTransport {
    fn write(&mut self, command: u16, data: &[u8]) -> Result<()> {
        let request_type = rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);
        self.handle
            .write_control(request_type, 0, command, LED_INDEX, data, WRITE_TIMEOUT)
            .map_err(|e| Error::Led(format!("control transfer failed: {e}")))?;
        Ok(())
    }
}
