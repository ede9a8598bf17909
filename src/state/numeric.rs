//! Client numeric allocation for our own service clients.

use slirc_p10::numeric::encode;
use std::sync::atomic::{AtomicU64, Ordering};

/// Width of the client part of a numeric.
const CLIENT_SLOT_LEN: usize = 3;

/// Hands out `<server><slot>` numerics for service clients.
///
/// Format: server numeric (2 chars) + slot (3 chars base64) = 5 chars.
/// Example: "ASAAA"
pub struct ClientNumerics {
    server: String,
    counter: AtomicU64,
}

impl ClientNumerics {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Generate the next client numeric.
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.server, encode(n, CLIENT_SLOT_LEN))
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerics_are_sequential() {
        let numerics = ClientNumerics::new("AS");
        assert_eq!(numerics.next(), "ASAAA");
        assert_eq!(numerics.next(), "ASAAB");
        assert_eq!(numerics.next(), "ASAAC");
        assert_eq!(numerics.server(), "AS");
    }
}
