//! P10 link handshake.
//!
//! We connect out, send `PASS` and `SERVER`, and wait for the hub to answer
//! with its own `PASS` and `SERVER`. Once the hub's `EB` arrives and we have
//! answered with our burst and `EA`, the link is synced.

use crate::state::Server;
use slirc_p10::Line;
use slirc_p10::numeric::{SERVER_NUMERIC_LEN, is_server_numeric};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet.
    Unconnected,
    /// We sent PASS and SERVER and wait for the hub's.
    Initiated,
    /// The hub introduced itself; bursts are flowing.
    Bursting,
    /// The hub's burst ended and we acknowledged it.
    Synced,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("password mismatch")]
    AuthenticationFailed,
    #[error("protocol error: {0}")]
    ProtocolError(String),
}

pub struct HandshakeMachine {
    pub state: HandshakeState,
    pub remote_pass: Option<String>,
    pub remote_name: Option<String>,
    pub remote_numeric: Option<String>,
    pub remote_info: Option<String>,

    // Local identity
    pub local_numeric: String,
    pub local_name: String,
    pub local_desc: String,
    pub max_clients: String,
    password: String,
}

impl HandshakeMachine {
    pub fn new(
        local_numeric: String,
        local_name: String,
        local_desc: String,
        max_clients: String,
        password: String,
    ) -> Self {
        Self {
            state: HandshakeState::Unconnected,
            remote_pass: None,
            remote_name: None,
            remote_numeric: None,
            remote_info: None,
            local_numeric,
            local_name,
            local_desc,
            max_clients,
            password,
        }
    }

    /// Lines that open the link. `started` is our boot time, `now` the link time.
    pub fn introduction(&mut self, started: i64, now: i64) -> Vec<String> {
        self.state = HandshakeState::Initiated;
        vec![
            format!("PASS :{}", self.password),
            format!(
                "SERVER {} 1 {} {} J10 {}{} +s6 :{}",
                self.local_name,
                started,
                now,
                self.local_numeric,
                self.max_clients,
                self.local_desc
            ),
        ]
    }

    /// Record the hub's `PASS`.
    pub fn on_pass(&mut self, line: &Line<'_>) {
        let pass = line
            .trailing(1)
            .or_else(|| line.get(1))
            .unwrap_or_default();
        self.remote_pass = Some(pass.to_string());
    }

    /// Accept the hub's `SERVER` line, returning the hub as a [`Server`].
    ///
    /// Format: `SERVER <name> <hops> <start> <link> <J10|P10> <numeric><max> <flags> :<info>`
    pub fn on_server(&mut self, line: &Line<'_>) -> Result<Server, HandshakeError> {
        if self.state != HandshakeState::Initiated {
            return Err(HandshakeError::ProtocolError(format!(
                "unexpected SERVER in state {:?}",
                self.state
            )));
        }
        if self.remote_pass.as_deref() != Some(self.password.as_str()) {
            return Err(HandshakeError::AuthenticationFailed);
        }

        let (Some(name), Some(hops), Some(numeric_field)) = (line.get(1), line.get(2), line.get(6))
        else {
            return Err(HandshakeError::ProtocolError("short SERVER line".into()));
        };
        let numeric = numeric_field.get(..SERVER_NUMERIC_LEN).unwrap_or_default();
        if !is_server_numeric(numeric) {
            return Err(HandshakeError::ProtocolError(format!(
                "bad server numeric {numeric_field}"
            )));
        }

        self.remote_name = Some(name.to_string());
        self.remote_numeric = Some(numeric.to_string());
        self.remote_info = line.trailing(7).map(str::to_string);
        self.state = HandshakeState::Bursting;

        Ok(Server {
            numeric: numeric.to_string(),
            name: name.to_string(),
            uplink: None,
            hops: hops.parse().unwrap_or(1),
        })
    }

    /// The hub's burst ended.
    pub fn on_end_of_burst(&mut self) {
        if self.state == HandshakeState::Bursting {
            self.state = HandshakeState::Synced;
        }
    }
}
