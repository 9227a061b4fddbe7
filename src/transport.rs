use std::time::Duration;

use log::debug;
use rusb::{Direction, Recipient, RequestType};

use crate::device::{ControlHandle, CONTROL_INTERFACE};
use crate::error::{Error, Result};
use crate::frame::{Frame, Frames, FRAME_LEN};

/// HID SET_REPORT.
pub const SET_REPORT: u8 = 0x09;
/// Output report, id 0.
pub const REPORT_VALUE: u16 = 0x0200;
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

pub fn request_type() -> u8 {
    rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface)
}

/// Writes one frame to the control interface; anything short of all eight
/// bytes is a failure.
pub fn send<H: ControlHandle + ?Sized>(handle: &mut H, frame: &Frame) -> Result<()> {
    let written = handle
        .write_control(
            request_type(),
            SET_REPORT,
            REPORT_VALUE,
            u16::from(CONTROL_INTERFACE),
            frame.as_bytes(),
            TRANSFER_TIMEOUT,
        )
        .map_err(|e| Error::TransferFailed {
            tag: frame.tag(),
            requested: FRAME_LEN,
            actual: 0,
            cause: Some(e),
        })?;
    if written != FRAME_LEN {
        return Err(Error::TransferFailed {
            tag: frame.tag(),
            requested: FRAME_LEN,
            actual: written,
            cause: None,
        });
    }
    debug!("sent frame {:#04x}: {}", frame.tag(), frame);
    Ok(())
}

/// Sends the tuning frame, then the audio frame. Stops at the first failure.
pub fn send_all<H: ControlHandle + ?Sized>(handle: &mut H, frames: &Frames) -> Result<()> {
    for frame in frames.in_order() {
        send(handle, frame)?;
    }
    Ok(())
}
