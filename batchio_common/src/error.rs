//! I/O error codes.
//!
//! `IoError` is what gets stored in state records: the common read/write
//! status of a transaction and the per-point error attributes. It is `Copy`
//! and comparable so that status transitions can be computed by plain
//! equality against the previously committed value.

use core::fmt;
use thiserror::Error;

/// Error code recorded for a failed or invalidated I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum IoError {
    /// No data is available.
    ///
    /// Used to invalidate inputs without a device round trip (device
    /// disconnect, shutdown) and as the initial state of every input.
    #[error("no data available")]
    NoData,

    /// The device or its transport reported an error.
    ///
    /// The code is opaque to the core and is stored verbatim.
    #[error("device error (code {code})")]
    Device {
        /// Transport specific error code
        code: i32,
    },

    /// The payload did not contain a decodable value for this point.
    #[error("payload could not be decoded")]
    Decode,

    /// The pending value could not be encoded into the command.
    #[error("value could not be encoded")]
    Encode,
}

impl IoError {
    /// Shorthand for a device error with the given code.
    #[inline]
    pub const fn device(code: i32) -> Self {
        Self::Device { code }
    }

    /// Numeric representation used by read handles and log output.
    ///
    /// `NoData`, `Decode` and `Encode` map to fixed negative values so they
    /// never collide with positive device codes.
    pub const fn code(&self) -> i32 {
        match self {
            Self::NoData => -1,
            Self::Decode => -2,
            Self::Encode => -3,
            Self::Device { code } => *code,
        }
    }
}

/// Formats an optional error the way status attributes print it.
pub struct DisplayError<'a>(pub &'a Option<IoError>);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(error) => write!(f, "{error}"),
            None => f.write_str("ok"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_codes_are_kept_verbatim() {
        let err = IoError::device(0x2a);
        assert_eq!(err.code(), 42);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn synthetic_codes_are_negative() {
        assert!(IoError::NoData.code() < 0);
        assert!(IoError::Decode.code() < 0);
        assert!(IoError::Encode.code() < 0);
        assert_ne!(IoError::NoData, IoError::Decode);
    }

    #[test]
    fn display_error_formats_none_as_ok() {
        assert_eq!(DisplayError(&None).to_string(), "ok");
        assert_eq!(
            DisplayError(&Some(IoError::NoData)).to_string(),
            "no data available"
        );
    }
}
