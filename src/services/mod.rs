//! Service modules.
//!
//! Each module is a variant of [`Module`]; the [`ModuleRouter`] calls the
//! enabled ones in the order they were registered.

pub mod chanserv;
pub mod helpserv;
pub mod spamscan;
pub mod traits;

pub use chanserv::ChanServ;
pub use helpserv::HelpServ;
pub use spamscan::SpamScan;
pub use traits::{NewUser, ServiceModule};

use crate::config::ModulesConfig;
use crate::db::{DbError, ServiceStore};
use crate::error::LinkError;
use crate::sync::burst::BurstMap;
use crate::sync::context::LinkContext;
use async_trait::async_trait;
use tracing::{debug, info};

/// Every module the daemon knows about.
pub enum Module {
    ChanServ(ChanServ),
    HelpServ(HelpServ),
    SpamScan(SpamScan),
}

macro_rules! delegate {
    ($self:ident, $m:ident => $body:expr) => {
        match $self {
            Module::ChanServ($m) => $body,
            Module::HelpServ($m) => $body,
            Module::SpamScan($m) => $body,
        }
    };
}

#[async_trait]
impl ServiceModule for Module {
    fn name(&self) -> &'static str {
        delegate!(self, m => m.name())
    }

    fn is_enabled(&self) -> bool {
        delegate!(self, m => m.is_enabled())
    }

    async fn handshake(&mut self, ctx: &LinkContext) -> Result<(), LinkError> {
        delegate!(self, m => m.handshake(ctx).await)
    }

    async fn parse_line(&mut self, ctx: &LinkContext, raw: &str) -> Result<(), LinkError> {
        delegate!(self, m => m.parse_line(ctx, raw).await)
    }

    async fn handle_new_user(
        &mut self,
        ctx: &LinkContext,
        user: &NewUser<'_>,
    ) -> Result<bool, LinkError> {
        delegate!(self, m => m.handle_new_user(ctx, user).await)
    }

    async fn handle_authentication(
        &mut self,
        ctx: &LinkContext,
        numeric: &str,
        account: &str,
        server_numeric: &str,
    ) -> Result<(), LinkError> {
        delegate!(self, m => m.handle_authentication(ctx, numeric, account, server_numeric).await)
    }

    fn register_burst_channels(&mut self, bursts: &mut BurstMap, server_numeric: &str) {
        delegate!(self, m => m.register_burst_channels(bursts, server_numeric))
    }

    async fn post_load_initialization(&mut self, store: &dyn ServiceStore) -> Result<(), DbError> {
        delegate!(self, m => m.post_load_initialization(store).await)
    }
}

/// Fans link events out to the enabled modules, in registration order.
pub struct ModuleRouter {
    modules: Vec<Module>,
}

impl ModuleRouter {
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }

    /// Build the router from configuration. Disabled modules are kept so
    /// their names still show up in the startup log.
    pub fn from_config(config: &ModulesConfig) -> Self {
        Self::new(vec![
            Module::ChanServ(ChanServ::new(config.chanserv.clone())),
            Module::HelpServ(HelpServ::new(config.helpserv.clone())),
            Module::SpamScan(SpamScan::new(config.spamscan.clone())),
        ])
    }

    fn enabled(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.iter_mut().filter(|m| m.is_enabled())
    }

    pub fn enabled_names(&self) -> Vec<&'static str> {
        self.modules
            .iter()
            .filter(|m| m.is_enabled())
            .map(|m| m.name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub async fn handshake(&mut self, ctx: &LinkContext) -> Result<(), LinkError> {
        for module in self.enabled() {
            debug!(module = module.name(), "Module handshake");
            module.handshake(ctx).await?;
        }
        Ok(())
    }

    pub async fn parse_line(&mut self, ctx: &LinkContext, raw: &str) -> Result<(), LinkError> {
        for module in self.enabled() {
            module.parse_line(ctx, raw).await?;
        }
        Ok(())
    }

    /// True as soon as one module reports the user handled. Later modules
    /// are not asked.
    pub async fn handle_new_user(
        &mut self,
        ctx: &LinkContext,
        user: &NewUser<'_>,
    ) -> Result<bool, LinkError> {
        for module in self.enabled() {
            if module.handle_new_user(ctx, user).await? {
                info!(module = module.name(), nick = %user.nick, "New user handled by module");
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn handle_authentication(
        &mut self,
        ctx: &LinkContext,
        numeric: &str,
        account: &str,
        server_numeric: &str,
    ) -> Result<(), LinkError> {
        for module in self.enabled() {
            module
                .handle_authentication(ctx, numeric, account, server_numeric)
                .await?;
        }
        Ok(())
    }

    pub fn register_burst_channels(&mut self, bursts: &mut BurstMap, server_numeric: &str) {
        for module in self.enabled() {
            module.register_burst_channels(bursts, server_numeric);
        }
    }

    pub async fn post_load_initialization(&mut self, store: &dyn ServiceStore) -> Result<(), DbError> {
        for module in self.enabled() {
            module.post_load_initialization(store).await?;
        }
        Ok(())
    }
}
