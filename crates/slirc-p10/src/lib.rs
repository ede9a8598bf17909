//! # slirc-p10
//!
//! Primitives for the P10 server-link protocol spoken by ircu-family servers:
//!
//! - [`numeric`]: the base64 numeric alphabet used for server and client ids
//! - [`ip`]: the compact 6/24-character client address encoding
//! - [`line`]: a whitespace tokenizer that keeps trailing text intact
//! - [`burst`]: `B` member lists with sticky `:o`/`:v` suffixes
//! - [`casemap`]: RFC 1459 case folding for nicks and channels
//!
//! ```rust
//! use slirc_p10::{decode_ip, Line};
//!
//! let line = Line::parse("AB N Nick 1 1700000000 ident host B]AAAB ABAAA :Real Name");
//! assert_eq!(line.command(), Some("N"));
//! assert_eq!(decode_ip("B]AAAB").unwrap().to_string(), "127.0.0.1");
//! ```

#![deny(clippy::all)]

pub mod burst;
pub mod casemap;
pub mod error;
pub mod ip;
pub mod line;
pub mod numeric;

pub use burst::{BurstFields, BurstMember, MemberFlags, format_members, parse_members};
pub use casemap::{irc_eq, irc_to_lower};
pub use error::{IpDecodeError, NumericError};
pub use ip::{decode_ip, encode_ip};
pub use line::Line;
