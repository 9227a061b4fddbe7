//! Normalising and bounds-checking of user supplied transmitter settings.
//!
//! Raw values arrive as strings (or not at all). A missing value and the `-`
//! placeholder both select the per-field default, so every field of
//! [`Settings`] is defined once validation succeeds. Rules are checked in a
//! fixed order (gain, channels, frequency, PA, transmitter) and the first
//! failure is reported.

use std::fmt;
use std::ops::RangeInclusive;

use log::debug;

use crate::error::{Error, Result};

pub const GAIN_RANGE: RangeInclusive<u8> = 0..=7;
pub const CHANNEL_RANGE: RangeInclusive<u8> = 1..=2;
pub const FREQUENCY_RANGE: RangeInclusive<f64> = 76.0..=108.0;
pub const POWER_RANGE: RangeInclusive<u8> = 30..=120;
pub const TRANSMITTER_RANGE: RangeInclusive<u8> = 0..=23;

pub const DEFAULT_GAIN: u8 = 7;
pub const DEFAULT_POWER: u8 = 120;

/// Placeholder accepted for any valued field meaning "use the default".
pub const DEFAULT_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Mono,
    Stereo,
}

impl ChannelMode {
    pub fn channels(self) -> u8 {
        match self {
            ChannelMode::Mono => 1,
            ChannelMode::Stereo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreEmphasis {
    Us50,
    Us75,
}

impl fmt::Display for PreEmphasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreEmphasis::Us50 => write!(f, "50us"),
            PreEmphasis::Us75 => write!(f, "75us"),
        }
    }
}

/// Validated transmitter configuration.
///
/// `gain` and `transmitter` select the two alternative encodings of the same
/// frame byte, so at most one of them may be set. With neither set the device
/// keeps its own default. `frequency_mhz == None` leaves the tuned frequency
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub gain: Option<u8>,
    pub channel_mode: ChannelMode,
    pub frequency_mhz: Option<f64>,
    pub power: u8,
    pub pre_emphasis: PreEmphasis,
    pub transmit_enabled: bool,
    pub muted: bool,
    pub transmitter: Option<u8>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            gain: Some(DEFAULT_GAIN),
            channel_mode: ChannelMode::Stereo,
            frequency_mhz: None,
            power: DEFAULT_POWER,
            pre_emphasis: PreEmphasis::Us50,
            transmit_enabled: true,
            muted: false,
            transmitter: None,
        }
    }
}

impl Settings {
    /// Re-checks every numeric field against its documented interval.
    ///
    /// [`RawSettings::validate`] only produces values that pass, but the
    /// fields are public so the encoder runs this again before building
    /// frames.
    pub fn check(&self) -> Result<()> {
        if let Some(gain) = self.gain {
            if !GAIN_RANGE.contains(&gain) {
                return Err(Error::out_of_range("gain", gain, *GAIN_RANGE.start(), *GAIN_RANGE.end()));
            }
        }
        if let Some(freq) = self.frequency_mhz {
            if !FREQUENCY_RANGE.contains(&freq) {
                return Err(Error::out_of_range(
                    "frequency",
                    freq,
                    *FREQUENCY_RANGE.start(),
                    *FREQUENCY_RANGE.end(),
                ));
            }
        }
        if !POWER_RANGE.contains(&self.power) {
            return Err(Error::out_of_range("PA", self.power, *POWER_RANGE.start(), *POWER_RANGE.end()));
        }
        if let Some(index) = self.transmitter {
            if !TRANSMITTER_RANGE.contains(&index) {
                return Err(Error::out_of_range(
                    "transmitter",
                    index,
                    *TRANSMITTER_RANGE.start(),
                    *TRANSMITTER_RANGE.end(),
                ));
            }
        }
        if self.gain.is_some() && self.transmitter.is_some() {
            return Err(Error::InvalidCombination {
                first: "gain",
                second: "transmitter",
            });
        }
        Ok(())
    }
}

/// Settings as handed over by the caller, before any parsing.
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    pub gain: Option<String>,
    pub channels: Option<String>,
    pub frequency: Option<String>,
    pub power: Option<String>,
    pub transmitter: Option<String>,
    pub pre_emphasis_75us: bool,
    pub disabled: bool,
    pub muted: bool,
}

impl RawSettings {
    pub fn validate(&self) -> Result<Settings> {
        let gain = parse_int("gain", self.gain.as_deref())?
            .map(|g| in_range("gain", g, &GAIN_RANGE))
            .transpose()?;

        let channel_mode = match parse_int("channels", self.channels.as_deref())? {
            None => ChannelMode::Stereo,
            Some(n) => match in_range("channels", n, &CHANNEL_RANGE)? {
                1 => ChannelMode::Mono,
                _ => ChannelMode::Stereo,
            },
        };

        let frequency_mhz = parse_frequency(self.frequency.as_deref())?;

        let power = parse_int("PA", self.power.as_deref())?
            .map(|p| in_range("PA", p, &POWER_RANGE))
            .transpose()?
            .unwrap_or(DEFAULT_POWER);

        let transmitter = parse_int("transmitter", self.transmitter.as_deref())?
            .map(|t| in_range("transmitter", t, &TRANSMITTER_RANGE))
            .transpose()?;

        let gain = match (gain, transmitter) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidCombination {
                    first: "gain",
                    second: "transmitter",
                })
            }
            (Some(g), None) => Some(g),
            (None, Some(_)) => None,
            (None, None) => Some(DEFAULT_GAIN),
        };

        let settings = Settings {
            gain,
            channel_mode,
            frequency_mhz,
            power,
            pre_emphasis: if self.pre_emphasis_75us {
                PreEmphasis::Us75
            } else {
                PreEmphasis::Us50
            },
            transmit_enabled: !self.disabled,
            muted: self.muted,
            transmitter,
        };

        debug!(
            "gain {:?} chan {} freq {:?} pa {} off {} mute {} emph {} tx {:?}",
            settings.gain,
            settings.channel_mode.channels(),
            settings.frequency_mhz,
            settings.power,
            !settings.transmit_enabled,
            settings.muted,
            settings.pre_emphasis,
            settings.transmitter
        );
        Ok(settings)
    }
}

fn supplied(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| *s != DEFAULT_PLACEHOLDER)
}

fn parse_int(field: &'static str, raw: Option<&str>) -> Result<Option<i64>> {
    supplied(raw)
        .map(|s| {
            s.parse::<i64>().map_err(|_| Error::InvalidFormat {
                field,
                value: s.to_string(),
                expected: "integer",
            })
        })
        .transpose()
}

fn in_range(field: &'static str, value: i64, range: &RangeInclusive<u8>) -> Result<u8> {
    let (min, max) = (i64::from(*range.start()), i64::from(*range.end()));
    if value < min || value > max {
        return Err(Error::out_of_range(field, value, min, max));
    }
    Ok(value as u8)
}

/// `0` keeps the current frequency, as does leaving the value out.
fn parse_frequency(raw: Option<&str>) -> Result<Option<f64>> {
    let Some(s) = supplied(raw) else {
        return Ok(None);
    };
    let freq: f64 = s.parse().map_err(|_| Error::InvalidFormat {
        field: "frequency",
        value: s.to_string(),
        expected: "number in MHz",
    })?;
    if freq == 0.0 {
        return Ok(None);
    }
    if !FREQUENCY_RANGE.contains(&freq) {
        return Err(Error::OutOfRange {
            field: "frequency",
            value: s.to_string(),
            min: format!("{:.2}", FREQUENCY_RANGE.start()),
            max: format!("{:.2}", FREQUENCY_RANGE.end()),
        });
    }
    Ok(Some(freq))
}
