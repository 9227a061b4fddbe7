use std::time::Duration;

use log::{debug, info, trace, warn};
use rusb::{DeviceHandle, UsbContext};

use crate::error::{Error, Result};

pub const KEENE_VENDOR_ID: u16 = 0x046d;
pub const KEENE_PRODUCT_ID: u16 = 0x0a0e;

/// The transmitter listens on the second half of its HID device.
pub const CONTROL_INTERFACE: u8 = 2;

/// The operations needed on an opened device.
///
/// Implemented for [`rusb::DeviceHandle`]; tests substitute a scripted
/// handle.
pub trait ControlHandle {
    fn claim_interface(&mut self, iface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, iface: u8) -> rusb::Result<()>;

    fn detach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()>;

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

impl<C: UsbContext> ControlHandle for DeviceHandle<C> {
    fn claim_interface(&mut self, iface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, iface)
    }

    fn release_interface(&mut self, iface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, iface)
    }

    fn detach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, iface)
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::write_control(self, request_type, request, value, index, buf, timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Vendor and product id must both match.
    #[default]
    Strict,
    /// Any device from the vendor is accepted.
    VendorOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    pub product_id: u16,
    pub mode: MatchMode,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        DeviceFilter {
            vendor_id: KEENE_VENDOR_ID,
            product_id: KEENE_PRODUCT_ID,
            mode: MatchMode::Strict,
        }
    }
}

impl DeviceFilter {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        if vendor_id != self.vendor_id {
            return false;
        }
        match self.mode {
            MatchMode::Strict => product_id == self.product_id,
            MatchMode::VendorOnly => true,
        }
    }
}

/// Opens the first device on any bus accepted by `filter`.
///
/// Devices whose descriptor cannot be read are skipped. Only the first match
/// is tried: if it fails to open the search stops with
/// [`Error::DeviceOpenFailed`].
pub fn acquire<C: UsbContext>(context: &C, filter: &DeviceFilter) -> Result<DeviceHandle<C>> {
    let devices = context.devices().map_err(Error::Enumeration)?;
    for device in devices.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                debug!(
                    "skipping bus {} address {}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };
        trace!(
            "found device {:04x}:{:04x} on bus {} address {}",
            desc.vendor_id(),
            desc.product_id(),
            device.bus_number(),
            device.address()
        );
        if !filter.matches(desc.vendor_id(), desc.product_id()) {
            continue;
        }
        let handle = device.open().map_err(|source| Error::DeviceOpenFailed {
            bus: device.bus_number(),
            address: device.address(),
            source,
        })?;
        info!(
            "opened device {:04x}:{:04x} on bus {} address {}",
            desc.vendor_id(),
            desc.product_id(),
            device.bus_number(),
            device.address()
        );
        return Ok(handle);
    }
    Err(Error::DeviceNotFound {
        vendor_id: filter.vendor_id,
        product_id: filter.product_id,
    })
}

/// Claims `iface`, wrestling it away from the kernel HID driver if needed.
///
/// A busy interface gets exactly one recovery attempt: detach the kernel
/// driver, then claim once more.
pub fn claim_interface<H: ControlHandle + ?Sized>(handle: &mut H, iface: u8) -> Result<()> {
    match handle.claim_interface(iface) {
        Ok(()) => {}
        Err(rusb::Error::Busy) => {
            warn!("interface {} is busy, detaching kernel driver", iface);
            handle
                .detach_kernel_driver(iface)
                .map_err(|source| Error::DriverDetachFailed {
                    interface: iface,
                    source,
                })?;
            info!("detached kernel driver from interface {}", iface);
            handle
                .claim_interface(iface)
                .map_err(|source| Error::ClaimFailed {
                    interface: iface,
                    source,
                })?;
        }
        Err(source) => {
            return Err(Error::ClaimFailed {
                interface: iface,
                source,
            })
        }
    }
    debug!("claimed interface {}", iface);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_filter_needs_both_ids() {
        let filter = DeviceFilter::default();
        assert!(filter.matches(0x046d, 0x0a0e));
        assert!(!filter.matches(0x046d, 0xc52b));
        assert!(!filter.matches(0x05e3, 0x0a0e));
    }

    #[test]
    fn vendor_only_filter_ignores_product() {
        let filter = DeviceFilter {
            mode: MatchMode::VendorOnly,
            ..DeviceFilter::default()
        };
        assert!(filter.matches(0x046d, 0xc52b));
        assert!(!filter.matches(0x05e3, 0x0a0e));
    }
}
