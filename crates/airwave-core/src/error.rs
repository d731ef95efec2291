//! Error types for Airwave

use thiserror::Error;

/// Result type alias for Airwave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Airwave error types
#[derive(Error, Debug)]
pub enum Error {
    /// JSON encoding error
    #[error("encode error: {0}")]
    EncodeError(String),

    /// JSON decoding error
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Connection error
    #[error("connection error: {0}")]
    ConnectionError(String),
}

/// Protocol error codes (for ERROR messages)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // 100-199: Protocol errors
    InvalidMessage = 101,
    UnsupportedVersion = 102,

    // 500-599: Server errors
    ServiceUnavailable = 501,
}

impl ErrorCode {
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            101 => Some(ErrorCode::InvalidMessage),
            102 => Some(ErrorCode::UnsupportedVersion),
            501 => Some(ErrorCode::ServiceUnavailable),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip_through_the_wire_form() {
        for code in [
            ErrorCode::InvalidMessage,
            ErrorCode::UnsupportedVersion,
            ErrorCode::ServiceUnavailable,
        ] {
            assert_eq!(ErrorCode::from_u16(code as u16), Some(code));
        }
        assert_eq!(ErrorCode::from_u16(0), None);
        assert_eq!(ErrorCode::from_u16(999), None);
    }
}
