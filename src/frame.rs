//! Encoding of [`Settings`] into the two 8 byte configuration frames.
//!
//! Frame layout, as observed on the wire:
//!
//! | byte | tuning frame (0x50)      | audio frame (0x51)          |
//! |------|--------------------------|-----------------------------|
//! | 0    | 0x00                     | 0x00                        |
//! | 1    | 0x50                     | 0x51                        |
//! | 2    | frequency, high byte     | gain or transmitter nibble  |
//! | 3    | frequency, low byte      | MONO / PREEMPHASIS flags    |
//! | 4    | PA                       | 0x00                        |
//! | 5    | state flags              | 0x00                        |
//! | 6-7  | 0x00                     | 0x00                        |
//!
//! The frequency is sent as `round(20 * (MHz - 76))`, big endian.

use std::fmt;

use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};
use log::debug;

use crate::error::Result;
use crate::settings::{ChannelMode, PreEmphasis, Settings, TRANSMITTER_RANGE};

pub const FRAME_LEN: usize = 8;

pub const TAG_TUNING: u8 = 0x50;
pub const TAG_AUDIO: u8 = 0x51;

const FREQUENCY_BASE_MHZ: f64 = 76.0;
const FREQUENCY_STEPS_PER_MHZ: f64 = 20.0;

bitflags! {
    /// Byte 5 of the tuning frame. Exactly one of each ENABLE/DISABLE and
    /// MUTE/UNMUTE pair is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateFlags: u8 {
        const ENABLE = 0x01;
        const DISABLE = 0x02;
        const MUTE = 0x04;
        const UNMUTE = 0x08;
        /// Apply the frequency carried in bytes 2-3.
        const FREQ = 0x10;
    }
}

bitflags! {
    /// Byte 3 of the audio frame. Cleared bits mean stereo and 50us.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AudioFlags: u8 {
        const MONO = 0x01;
        const PREEMPHASIS = 0x04;
    }
}

impl StateFlags {
    pub fn from_settings(settings: &Settings) -> Self {
        let enable = if settings.transmit_enabled {
            StateFlags::ENABLE
        } else {
            StateFlags::DISABLE
        };
        let mute = if settings.muted {
            StateFlags::MUTE
        } else {
            StateFlags::UNMUTE
        };
        let freq = if settings.frequency_mhz.is_some() {
            StateFlags::FREQ
        } else {
            StateFlags::empty()
        };
        enable | mute | freq
    }
}

impl AudioFlags {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut flags = AudioFlags::empty();
        if settings.channel_mode == ChannelMode::Mono {
            flags |= AudioFlags::MONO;
        }
        if settings.pre_emphasis == PreEmphasis::Us75 {
            flags |= AudioFlags::PREEMPHASIS;
        }
        flags
    }
}

/// One fixed size configuration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    fn from_buf(buf: &BytesMut) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes.copy_from_slice(&buf[..FRAME_LEN]);
        Frame(bytes)
    }

    pub fn tag(&self) -> u8 {
        self.0[1]
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl From<[u8; FRAME_LEN]> for Frame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Frame(bytes)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Both frames of one configuration, sent tuning first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frames {
    pub tuning: Frame,
    pub audio: Frame,
}

impl Frames {
    pub fn in_order(&self) -> [&Frame; 2] {
        [&self.tuning, &self.audio]
    }
}

pub fn scale_frequency(mhz: f64) -> u16 {
    ((mhz - FREQUENCY_BASE_MHZ) * FREQUENCY_STEPS_PER_MHZ).round() as u16
}

pub fn unscale_frequency(scaled: u16) -> f64 {
    FREQUENCY_BASE_MHZ + f64::from(scaled) / FREQUENCY_STEPS_PER_MHZ
}

pub fn gain_byte(gain: u8) -> u8 {
    (gain & 0x07) << 4
}

/// Slot selection for devices exposing several transmitters.
pub fn transmitter_byte(index: u8) -> u8 {
    ((index % 6) << 4) | ((23 - index) / 6)
}

/// Builds both frames. Pure: no I/O and the same input always yields the
/// same bytes.
pub fn encode(settings: &Settings) -> Result<Frames> {
    settings.check()?;

    let mut tuning = BytesMut::with_capacity(FRAME_LEN);
    tuning.put_u8(0x00);
    tuning.put_u8(TAG_TUNING);
    match settings.frequency_mhz {
        Some(mhz) => tuning.put_u16(scale_frequency(mhz)),
        None => tuning.put_u16(0),
    }
    tuning.put_u8(settings.power);
    tuning.put_u8(StateFlags::from_settings(settings).bits());
    tuning.resize(FRAME_LEN, 0);

    let selector = match (settings.gain, settings.transmitter) {
        (_, Some(index)) => transmitter_byte(index),
        (Some(gain), None) => gain_byte(gain),
        (None, None) => 0x00,
    };

    let mut audio = BytesMut::with_capacity(FRAME_LEN);
    audio.put_u8(0x00);
    audio.put_u8(TAG_AUDIO);
    audio.put_u8(selector);
    audio.put_u8(AudioFlags::from_settings(settings).bits());
    audio.resize(FRAME_LEN, 0);

    let frames = Frames {
        tuning: Frame::from_buf(&tuning),
        audio: Frame::from_buf(&audio),
    };
    debug!("frame 1: {}", frames.tuning);
    debug!("frame 2: {}", frames.audio);
    Ok(frames)
}

/// Fields read back out of a frame pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub frequency_mhz: Option<f64>,
    pub power: u8,
    pub state: StateFlags,
    pub selector: u8,
    pub audio: AudioFlags,
}

impl Decoded {
    pub fn transmit_enabled(&self) -> bool {
        self.state.contains(StateFlags::ENABLE)
    }

    pub fn muted(&self) -> bool {
        self.state.contains(StateFlags::MUTE)
    }

    pub fn gain(&self) -> u8 {
        (self.selector >> 4) & 0x07
    }

    /// Transmitter index whose encoding matches the selector byte, if any.
    pub fn transmitter(&self) -> Option<u8> {
        TRANSMITTER_RANGE.into_iter().find(|&i| transmitter_byte(i) == self.selector)
    }

    pub fn channel_mode(&self) -> ChannelMode {
        if self.audio.contains(AudioFlags::MONO) {
            ChannelMode::Mono
        } else {
            ChannelMode::Stereo
        }
    }

    pub fn pre_emphasis(&self) -> PreEmphasis {
        if self.audio.contains(AudioFlags::PREEMPHASIS) {
            PreEmphasis::Us75
        } else {
            PreEmphasis::Us50
        }
    }
}

/// Returns `None` when the frames carry the wrong tags.
pub fn decode(frames: &Frames) -> Option<Decoded> {
    if frames.tuning.tag() != TAG_TUNING || frames.audio.tag() != TAG_AUDIO {
        return None;
    }

    let mut tuning = &frames.tuning.as_bytes()[2..];
    let scaled = tuning.get_u16();
    let power = tuning.get_u8();
    let state = StateFlags::from_bits_retain(tuning.get_u8());

    let mut audio = &frames.audio.as_bytes()[2..];
    let selector = audio.get_u8();
    let audio = AudioFlags::from_bits_retain(audio.get_u8());

    Some(Decoded {
        frequency_mhz: state.contains(StateFlags::FREQ).then(|| unscale_frequency(scaled)),
        power,
        state,
        selector,
        audio,
    })
}
