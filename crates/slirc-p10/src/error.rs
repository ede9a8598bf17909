//! Error types for P10 protocol primitives.

use thiserror::Error;

/// Errors produced while decoding P10 base64 numerics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    /// The input was empty.
    #[error("empty numeric")]
    Empty,

    /// A character outside the P10 base64 alphabet was found.
    #[error("invalid numeric character {0:?}")]
    InvalidChar(char),

    /// The numeric is too long to fit into 64 bits.
    #[error("numeric too long: {0} characters")]
    TooLong(usize),
}

/// Errors produced while decoding a compact P10 IP address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpDecodeError {
    /// Only 6-character (IPv4) and 24-character (IPv6) encodings are accepted.
    #[error("invalid encoded IP length {0} (expected 6 or 24)")]
    InvalidLength(usize),

    /// A character outside the P10 base64 alphabet was found.
    #[error("invalid character {0:?} in encoded IP")]
    InvalidChar(char),

    /// The decoded value does not fit in the address width.
    #[error("encoded IP value out of range")]
    Overflow,
}

impl From<NumericError> for IpDecodeError {
    fn from(err: NumericError) -> Self {
        match err {
            NumericError::InvalidChar(c) => IpDecodeError::InvalidChar(c),
            NumericError::Empty => IpDecodeError::InvalidLength(0),
            NumericError::TooLong(len) => IpDecodeError::InvalidLength(len),
        }
    }
}
