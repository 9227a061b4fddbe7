use thiserror::Error;

/// Exit status for a fully applied configuration.
pub const EXIT_OK: i32 = 0;
/// Exit status when the settings were rejected before any USB I/O.
pub const EXIT_VALIDATION: i32 = 2;
/// Exit status when no usable device could be found or opened.
pub const EXIT_DEVICE: i32 = 3;
/// Exit status when the control interface could not be claimed.
pub const EXIT_CLAIM: i32 = 4;
/// Exit status when a configuration frame was not fully transferred.
pub const EXIT_TRANSFER: i32 = 5;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{field}: {value:?} is not a valid {expected}")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{field} must be in range [{min} .. {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
    #[error("{first} and {second} cannot be set together")]
    InvalidCombination {
        first: &'static str,
        second: &'static str,
    },
    #[error("failed to list USB devices")]
    Enumeration(#[source] rusb::Error),
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },
    #[error("failed to open device on bus {bus} address {address}")]
    DeviceOpenFailed {
        bus: u8,
        address: u8,
        #[source]
        source: rusb::Error,
    },
    #[error("can't claim interface {interface}")]
    ClaimFailed {
        interface: u8,
        #[source]
        source: rusb::Error,
    },
    #[error("kernel driver did not release interface {interface}")]
    DriverDetachFailed {
        interface: u8,
        #[source]
        source: rusb::Error,
    },
    #[error("unable to send frame {tag:#04x}: requested {requested} bytes, transferred {actual}")]
    TransferFailed {
        tag: u8,
        requested: usize,
        actual: usize,
        cause: Option<rusb::Error>,
    },
}

impl Error {
    pub(crate) fn out_of_range<T: ToString>(field: &'static str, value: T, min: T, max: T) -> Self {
        Error::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// True for the outcomes detected before touching the bus.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat { .. } | Error::OutOfRange { .. } | Error::InvalidCombination { .. }
        )
    }

    /// Process exit status a caller should report for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidFormat { .. }
            | Error::OutOfRange { .. }
            | Error::InvalidCombination { .. } => EXIT_VALIDATION,
            Error::Enumeration(_) | Error::DeviceNotFound { .. } | Error::DeviceOpenFailed { .. } => {
                EXIT_DEVICE
            }
            Error::ClaimFailed { .. } | Error::DriverDetachFailed { .. } => EXIT_CLAIM,
            Error::TransferFailed { .. } => EXIT_TRANSFER,
        }
    }
}
