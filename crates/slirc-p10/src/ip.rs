//! Compact P10 client address encoding.
//!
//! IPv4 addresses travel as six base64 characters holding the 32-bit address
//! (the top four of the 36 available bits are zero). IPv6 addresses travel as
//! twenty-four characters: eight groups of three characters, one per 16-bit
//! segment. No other lengths are accepted.

use crate::error::IpDecodeError;
use crate::numeric;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Length of an encoded IPv4 address.
pub const IPV4_ENCODED_LEN: usize = 6;

/// Length of an encoded IPv6 address.
pub const IPV6_ENCODED_LEN: usize = 24;

/// Encode an address into its P10 form.
pub fn encode_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => numeric::encode(u64::from(u32::from(v4)), IPV4_ENCODED_LEN),
        IpAddr::V6(v6) => v6
            .segments()
            .iter()
            .map(|seg| numeric::encode(u64::from(*seg), 3))
            .collect(),
    }
}

/// Decode a P10 address.
pub fn decode_ip(encoded: &str) -> Result<IpAddr, IpDecodeError> {
    match encoded.len() {
        IPV4_ENCODED_LEN => {
            let value = numeric::decode(encoded)?;
            let v4 = u32::try_from(value).map_err(|_| IpDecodeError::Overflow)?;
            Ok(IpAddr::V4(Ipv4Addr::from(v4)))
        }
        IPV6_ENCODED_LEN => {
            let mut segments = [0u16; 8];
            for (i, seg) in segments.iter_mut().enumerate() {
                let chunk = encoded
                    .get(i * 3..i * 3 + 3)
                    .ok_or(IpDecodeError::InvalidLength(encoded.len()))?;
                let value = numeric::decode(chunk)?;
                *seg = u16::try_from(value).map_err(|_| IpDecodeError::Overflow)?;
            }
            Ok(IpAddr::V6(Ipv6Addr::from(segments)))
        }
        other => Err(IpDecodeError::InvalidLength(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_matches_known_encoding() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(encode_ip(ip), "B]AAAB");
        assert_eq!(decode_ip("B]AAAB").unwrap(), ip);
    }

    #[test]
    fn ipv4_overflow_is_rejected() {
        // Top character carries bits above 32.
        assert_eq!(decode_ip("]]]]]]"), Err(IpDecodeError::Overflow));
    }

    #[test]
    fn ipv6_segments_are_three_chars() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        let encoded = encode_ip(ip);
        assert_eq!(encoded.len(), IPV6_ENCODED_LEN);
        assert_eq!(decode_ip(&encoded).unwrap(), ip);
    }
}
