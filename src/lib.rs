//! Host side control of the Keene USB FM transmitter.
//!
//! The device is configured with two 8 byte HID output reports written to
//! interface 2. Typical use:
//!
//! ```no_run
//! use keene_fm::{apply, DeviceFilter, RawSettings};
//!
//! let raw = RawSettings {
//!     frequency: Some("100.00".into()),
//!     ..RawSettings::default()
//! };
//! let settings = raw.validate()?;
//! let context = rusb::Context::new().map_err(keene_fm::Error::Enumeration)?;
//! apply(&context, &DeviceFilter::default(), &settings)?;
//! # Ok::<(), keene_fm::Error>(())
//! ```

pub mod device;
pub mod error;
pub mod frame;
pub mod session;
pub mod settings;
pub mod transport;

use log::info;
use rusb::UsbContext;

pub use crate::device::{acquire, DeviceFilter, MatchMode, CONTROL_INTERFACE};
pub use crate::error::{Error, Result};
pub use crate::frame::{encode, Frame, Frames};
pub use crate::session::Session;
pub use crate::settings::{ChannelMode, PreEmphasis, RawSettings, Settings};

/// Encodes `settings`, finds the transmitter and sends both frames.
///
/// Frames are built before the bus is touched, so invalid settings never
/// open the device. The interface is released on every path once claimed.
pub fn apply<C: UsbContext>(context: &C, filter: &DeviceFilter, settings: &Settings) -> Result<()> {
    let frames = encode(settings)?;
    let handle = acquire(context, filter)?;
    let mut session = Session::claim(handle, CONTROL_INTERFACE)?;
    session.send(&frames)?;
    session.release();
    info!("transmitter configured");
    Ok(())
}
