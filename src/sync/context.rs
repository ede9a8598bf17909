//! Shared handles for everything that acts on the link.

use crate::db::ServiceStore;
use crate::error::LinkError;
use crate::state::{ClientNumerics, StateStore, User, UserModes};
use crate::sync::writer::LineWriter;
use slirc_p10::encode_ip;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Everything a handler or module needs: our identity, the network mirror,
/// the store and the outbound writer.
pub struct LinkContext {
    /// Our server numeric.
    pub numeric: String,
    /// Our server name.
    pub server_name: String,
    pub state: Arc<StateStore>,
    pub store: Arc<dyn ServiceStore>,
    pub writer: Arc<dyn LineWriter>,
    /// Allocator for our own service clients.
    pub clients: ClientNumerics,
    /// Serializes user registration parse-and-commit.
    pub registration: Mutex<()>,
}

impl LinkContext {
    pub fn new(
        numeric: impl Into<String>,
        server_name: impl Into<String>,
        state: Arc<StateStore>,
        store: Arc<dyn ServiceStore>,
        writer: Arc<dyn LineWriter>,
    ) -> Self {
        let numeric = numeric.into();
        Self {
            clients: ClientNumerics::new(numeric.clone()),
            numeric,
            server_name: server_name.into(),
            state,
            store,
            writer,
            registration: Mutex::new(()),
        }
    }

    /// Send one line upstream.
    pub async fn send(&self, line: impl AsRef<str> + Send) -> Result<(), LinkError> {
        self.writer.write_line(line.as_ref()).await
    }

    /// True if `numeric` is one of our own clients.
    pub fn is_local(&self, numeric: &str) -> bool {
        slirc_p10::numeric::server_of(numeric) == self.numeric
    }

    /// Introduce a service client and record it in the mirror.
    ///
    /// The client is `+k` (service) and `+o`, with extra user modes appended.
    pub async fn introduce_client(
        &self,
        nick: &str,
        ident: &str,
        host: &str,
        realname: &str,
    ) -> Result<String, LinkError> {
        let numeric = self.clients.next();
        let ts = now();
        let modes = UserModes::from_mode_string("+iok");
        self.send(format!(
            "{} N {} 1 {} {} {} {} {} {} :{}",
            self.numeric,
            nick,
            ts,
            ident,
            host,
            modes.as_mode_string(),
            encode_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            numeric,
            realname
        ))
        .await?;

        self.state.insert_user(User {
            numeric: numeric.clone(),
            nick: nick.to_string(),
            ident: ident.to_string(),
            host: host.to_string(),
            hidden_host: None,
            ip: None,
            account: None,
            modes,
            oper_name: None,
            nick_ts: ts,
            realname: realname.to_string(),
            channels: HashSet::new(),
        });
        info!(nick = %nick, numeric = %numeric, "Service client introduced");
        Ok(numeric)
    }
}

/// Current Unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
