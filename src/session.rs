use log::{debug, warn};

use crate::device::{claim_interface, ControlHandle};
use crate::error::Result;
use crate::frame::{self, Frames};
use crate::settings::Settings;
use crate::transport;

/// An opened device with its control interface claimed.
///
/// The interface is released exactly once, either through
/// [`Session::release`] or when the session is dropped, and always before the
/// handle itself is closed.
pub struct Session<H: ControlHandle> {
    handle: H,
    interface: u8,
    claimed: bool,
}

impl<H: ControlHandle> Session<H> {
    /// Takes ownership of `handle` and claims `interface` on it. On failure
    /// the handle is dropped, which closes it.
    pub fn claim(mut handle: H, interface: u8) -> Result<Self> {
        claim_interface(&mut handle, interface)?;
        Ok(Session {
            handle,
            interface,
            claimed: true,
        })
    }

    pub fn interface(&self) -> u8 {
        self.interface
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Sends both frames in protocol order.
    pub fn send(&mut self, frames: &Frames) -> Result<()> {
        transport::send_all(&mut self.handle, frames)
    }

    /// Encodes `settings` and sends the result.
    pub fn configure(&mut self, settings: &Settings) -> Result<()> {
        let frames = frame::encode(settings)?;
        self.send(&frames)
    }

    /// Releases the claimed interface. Safe to call more than once; errors
    /// are logged and never returned so they cannot hide the outcome of the
    /// operation that preceded them.
    pub fn release(&mut self) {
        if !self.claimed {
            return;
        }
        self.claimed = false;
        match self.handle.release_interface(self.interface) {
            Ok(()) => debug!("released interface {}", self.interface),
            Err(e) => warn!("failed to release interface {}: {}", self.interface, e),
        }
    }
}

impl<H: ControlHandle> Drop for Session<H> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Releases `session` if there is one.
pub fn release<H: ControlHandle>(session: Option<Session<H>>) {
    if let Some(mut session) = session {
        session.release();
    }
}
