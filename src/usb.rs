//! libusb transport for the drum kit's interrupt IN endpoint.
//!
//! On Linux the kit is grabbed by the kernel HID driver; it is detached
//! automatically while the interface is claimed and reattached when the
//! handle is dropped.

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, info, warn};

use crate::error::{DrumError, Result};
use crate::poller::{ReadError, Transport, REPORT_LEN};

pub const INTERFACE: u8 = 0;
pub const ENDPOINT_IN: u8 = 0x81;

/// An opened kit with its interface claimed. Released on drop.
pub struct UsbDrumkit {
    handle: DeviceHandle<GlobalContext>,
    timeout: Duration,
}

impl UsbDrumkit {
    /// Open the first device matching `vendor_id:product_id` and claim its interface.
    ///
    /// `read_timeout` of `None` blocks forever on each read.
    pub fn open(vendor_id: u16, product_id: u16, read_timeout: Option<Duration>) -> Result<Self> {
        let mut handle = rusb::open_device_with_vid_pid(vendor_id, product_id).ok_or_else(|| {
            DrumError::TransportUnavailable(format!(
                "no device {vendor_id:04x}:{product_id:04x}, is the kit connected?"
            ))
        })?;

        if rusb::supports_detach_kernel_driver() {
            handle
                .set_auto_detach_kernel_driver(true)
                .map_err(|e| DrumError::TransportUnavailable(format!("auto detach kernel driver: {e}")))?;
        }
        handle
            .claim_interface(INTERFACE)
            .map_err(|e| DrumError::TransportUnavailable(format!("claim interface {INTERFACE}: {e}")))?;

        info!("drum kit {vendor_id:04x}:{product_id:04x} connected");
        debug!(interface = INTERFACE, endpoint = ENDPOINT_IN, ?read_timeout, "interface claimed");

        Ok(Self {
            handle,
            // libusb treats 0 as "no timeout"
            timeout: read_timeout.unwrap_or(Duration::ZERO),
        })
    }
}

impl Transport for UsbDrumkit {
    fn read_fixed(&mut self, buf: &mut [u8; REPORT_LEN]) -> core::result::Result<usize, ReadError> {
        match self.handle.read_interrupt(ENDPOINT_IN, buf, self.timeout) {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Err(ReadError::Timeout),
            Err(e) => Err(ReadError::Failed(e.to_string())),
        }
    }
}

impl Drop for UsbDrumkit {
    fn drop(&mut self) {
        match self.handle.release_interface(INTERFACE) {
            Ok(()) => debug!("interface released"),
            // an unplugged kit cannot be released, nothing left to do
            Err(rusb::Error::NoDevice) => debug!("device gone before release"),
            Err(e) => warn!("release interface {INTERFACE}: {e}"),
        }
    }
}
