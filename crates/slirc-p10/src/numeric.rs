//! P10 base64 numerics.
//!
//! P10 identifies servers and clients with fixed-width, big-endian base64
//! numbers drawn from the alphabet `A-Z a-z 0-9 [ ]`. Servers use two
//! characters, clients use five (the server's two followed by three for the
//! client slot).

use crate::error::NumericError;

/// The P10 base64 alphabet, in value order.
pub const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789[]";

/// Width of a server numeric.
pub const SERVER_NUMERIC_LEN: usize = 2;

/// Width of a client numeric (server part included).
pub const CLIENT_NUMERIC_LEN: usize = 5;

/// Value of a single alphabet character.
#[inline]
pub const fn char_value(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'[' => Some(62),
        b']' => Some(63),
        _ => None,
    }
}

/// Encode `value` as exactly `width` characters.
///
/// Bits above `6 * width` are discarded.
pub fn encode(mut value: u64, width: usize) -> String {
    let mut out = vec![b'A'; width];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value & 63) as usize];
        value >>= 6;
    }
    // Every byte comes from ALPHABET, which is ASCII.
    String::from_utf8_lossy(&out).into_owned()
}

/// Decode a base64 numeric of any width up to ten characters.
pub fn decode(s: &str) -> Result<u64, NumericError> {
    if s.is_empty() {
        return Err(NumericError::Empty);
    }
    if s.len() > 10 {
        return Err(NumericError::TooLong(s.len()));
    }
    s.bytes().try_fold(0u64, |acc, b| {
        char_value(b)
            .map(|v| (acc << 6) | u64::from(v))
            .ok_or(NumericError::InvalidChar(b as char))
    })
}

/// True if `s` is a well-formed two-character server numeric.
pub fn is_server_numeric(s: &str) -> bool {
    s.len() == SERVER_NUMERIC_LEN && s.bytes().all(|b| char_value(b).is_some())
}

/// True if `s` is a well-formed five-character client numeric.
pub fn is_client_numeric(s: &str) -> bool {
    s.len() == CLIENT_NUMERIC_LEN && s.bytes().all(|b| char_value(b).is_some())
}

/// Server part of a client numeric (`ABAAC` → `AB`).
pub fn server_of(client: &str) -> &str {
    client.get(..SERVER_NUMERIC_LEN).unwrap_or(client)
}
