//! Security module for slservices.
//!
//! - **Masks**: case-insensitive `*`/`?` wildcard matching
//! - **Trust-check**: connection admission control answered over `TC`/`TR`

pub mod mask;
pub mod trust;

pub use mask::{WildcardMask, wildcard_match};
pub use trust::{TrustCheck, TrustRule, TrustVerdict};
