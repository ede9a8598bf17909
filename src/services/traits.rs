use crate::db::{DbError, ServiceStore};
use crate::error::LinkError;
use crate::sync::burst::BurstMap;
use crate::sync::context::LinkContext;
use async_trait::async_trait;

/// A user about to be committed, as seen by modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewUser<'a> {
    pub numeric: &'a str,
    pub nick: &'a str,
    pub ident: &'a str,
    pub host: &'a str,
    pub account: Option<&'a str>,
    pub hidden_host: Option<&'a str>,
    pub realname: &'a str,
}

impl NewUser<'_> {
    /// `nick!ident@host` with the real host.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.host)
    }
}

/// Capabilities every service module exposes to the link.
///
/// Hooks run in module registration order. Only enabled modules are called.
#[async_trait]
pub trait ServiceModule: Send {
    /// Short name for logs (e.g., "chanserv").
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    /// Called once the handshake is sent. Modules introduce their clients here.
    async fn handshake(&mut self, ctx: &LinkContext) -> Result<(), LinkError>;

    /// Every raw inbound line, after core handling for that line.
    async fn parse_line(&mut self, _ctx: &LinkContext, _raw: &str) -> Result<(), LinkError> {
        Ok(())
    }

    /// Inspect a new user before it is committed.
    ///
    /// Returning `true` means the module dealt with the user (e.g., killed
    /// it) and the registration is abandoned.
    async fn handle_new_user(
        &mut self,
        _ctx: &LinkContext,
        _user: &NewUser<'_>,
    ) -> Result<bool, LinkError> {
        Ok(false)
    }

    /// A user identified to `account`.
    async fn handle_authentication(
        &mut self,
        _ctx: &LinkContext,
        _numeric: &str,
        _account: &str,
        _server_numeric: &str,
    ) -> Result<(), LinkError> {
        Ok(())
    }

    /// Add the channels this module wants to hold to the pending burst.
    fn register_burst_channels(&mut self, _bursts: &mut BurstMap, _server_numeric: &str) {}

    /// Load whatever the module needs from the store at startup.
    async fn post_load_initialization(&mut self, _store: &dyn ServiceStore) -> Result<(), DbError> {
        Ok(())
    }
}
