//! Link-level error handling for slservices.
//!
//! Everything that can end the uplink session funnels into [`LinkError`].
//! Subsystem errors (store, config) keep their own types and are logged
//! where they occur rather than tearing down the link.

use thiserror::Error;
use tokio_util::codec::{AnyDelimiterCodecError, LinesCodecError};

/// Errors that terminate a link session.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("line framing error: {0}")]
    Framing(#[from] AnyDelimiterCodecError),

    #[error("connection closed by peer")]
    Closed,

    #[error("link rejected: {0}")]
    Rejected(String),
}

impl LinkError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Codec(_) | Self::Framing(_) => "codec_error",
            Self::Closed => "closed",
            Self::Rejected(_) => "rejected",
        }
    }

    /// Reason text carried in the farewell SQ.
    pub fn farewell_reason(&self) -> String {
        match self {
            Self::Closed => "Uplink closed the connection".to_string(),
            Self::Rejected(reason) => format!("Link rejected: {reason}"),
            other => format!("Link error: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(LinkError::Closed.error_code(), "closed");
        assert_eq!(LinkError::Rejected("bad".into()).error_code(), "rejected");
        let io = LinkError::from(std::io::Error::other("boom"));
        assert_eq!(io.error_code(), "io_error");
    }

    #[test]
    fn farewell_mentions_cause() {
        assert_eq!(
            LinkError::Rejected("password mismatch".into()).farewell_reason(),
            "Link rejected: password mismatch"
        );
        assert!(LinkError::Closed.farewell_reason().contains("closed"));
    }
}
