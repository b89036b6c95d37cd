//! Error types for the library.

use thiserror::Error;

use crate::types::{DiscMode, Lsn};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while accessing a CD-DA device.
#[derive(Error, Debug)]
pub enum Error {
    /// Opening the device failed
    #[error("Could not open CD device {device:?} for reading: {cause}")]
    DeviceUnavailable {
        /// Device path as given by the caller
        device: String,
        /// Platform error string from the underlying open call
        cause: String,
    },

    /// The inserted disc does not carry raw audio
    #[error("Disc is not an Audio CD (disc mode: {mode})")]
    NotAudioDisc {
        /// Mode reported by the drive
        mode: DiscMode,
    },

    /// A sector read failed
    #[error("Read at sector {sector} failed: {cause}")]
    ReadFailure {
        /// Sector that was being read (LSN)
        sector: Lsn,
        /// Transport-level failure reported by the driver
        cause: TransportError,
    },

    /// Backend lacks an optional capability (speed control, CD-TEXT).
    ///
    /// Never surfaced from `open` or `read_sector`; logged and swallowed
    /// at the call site.
    #[error("Feature not supported by this backend: {0}")]
    UnsupportedFeature(&'static str),

    /// open() called while a device handle is already held
    #[error("Session is already open")]
    AlreadyOpen,

    /// read_sector() or close() called without an open handle
    #[error("Session is not open")]
    SessionClosed,

    /// open() called with an empty device path
    #[error("Device path is empty")]
    EmptyDevicePath,

    /// Device path cannot be passed to the backend
    #[error("Invalid device path: {0}")]
    InvalidDevicePath(String),

    /// Table of contents could not be read
    #[error("Unable to read table of contents: {0}")]
    TocReadError(String),
}

/// Transport-level errors, translated from libcdio `driver_return_code_t`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("Success")]
    Ok,
    #[error("Unspecified driver error")]
    DriverError,
    #[error("Operation not supported by driver")]
    Unsupported,
    #[error("Driver not initialized")]
    Uninitialized,
    #[error("Operation not permitted")]
    NotPermitted,
    #[error("Bad parameter")]
    BadParameter,
    #[error("Bad pointer")]
    BadPointer,
    #[error("No driver available")]
    NoDriver,
    #[error("MMC sense data returned")]
    MmcSenseData,
    #[error("Unknown driver error")]
    Unknown,
}

impl From<i32> for TransportError {
    fn from(value: i32) -> Self {
        match value {
            0 => TransportError::Ok,
            -1 => TransportError::DriverError,
            -2 => TransportError::Unsupported,
            -3 => TransportError::Uninitialized,
            -4 => TransportError::NotPermitted,
            -5 => TransportError::BadParameter,
            -6 => TransportError::BadPointer,
            -7 => TransportError::NoDriver,
            -8 => TransportError::MmcSenseData,
            _ => TransportError::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_from_code() {
        assert_eq!(TransportError::from(0), TransportError::Ok);
        assert_eq!(TransportError::from(-1), TransportError::DriverError);
        assert_eq!(TransportError::from(-2), TransportError::Unsupported);
        assert_eq!(TransportError::from(42), TransportError::Unknown);
    }

    #[test]
    fn test_error_display() {
        let err = Error::ReadFailure {
            sector: 150,
            cause: TransportError::DriverError,
        };
        let msg = err.to_string();
        assert!(msg.contains("150"));
        assert!(msg.contains("Unspecified driver error"));
    }
}
