//! ChanServ: holds registered channels.
//!
//! ChanServ sits in every registered channel from the burst on and answers
//! `HELP`. When a user identifies, channels they already sit in get their
//! autoop/autovoice applied.

use super::traits::ServiceModule;
use crate::config::ChanServConfig;
use crate::db::{AccessEntry, ChannelRecord, DbError, ServiceStore};
use crate::error::LinkError;
use crate::sync::burst::{AclFlags, BurstMap, MemberTag};
use crate::sync::context::{LinkContext, now};
use async_trait::async_trait;
use slirc_p10::{Line, irc_eq, irc_to_lower};
use tracing::{debug, info};

const HELP_TEXT: &[&str] = &[
    "ChanServ keeps registered channels and their access lists.",
    "Access is granted per account: autoop, autovoice or ban.",
    "Identify to your account and your access applies on join.",
];

pub struct ChanServ {
    config: ChanServConfig,
    numeric: Option<String>,
    registry: Vec<ChannelRecord>,
    access: Vec<AccessEntry>,
}

impl ChanServ {
    pub fn new(config: ChanServConfig) -> Self {
        Self {
            config,
            numeric: None,
            registry: Vec::new(),
            access: Vec::new(),
        }
    }

    /// Lowercase names of the channels we hold.
    pub fn registered_channels(&self) -> Vec<String> {
        self.registry.iter().map(|r| irc_to_lower(&r.name)).collect()
    }

    fn is_registered(&self, channel: &str) -> bool {
        self.registry.iter().any(|r| irc_eq(&r.name, channel))
    }

    fn flags_for(&self, channel: &str, account: &str) -> AclFlags {
        self.access
            .iter()
            .find(|e| irc_eq(&e.channel, channel) && e.account.eq_ignore_ascii_case(account))
            .map(AclFlags::parse)
            .unwrap_or_default()
    }

    /// `<source> P <target> :<text>` addressed to us.
    async fn handle_privmsg(&self, ctx: &LinkContext, line: &Line<'_>) -> Result<(), LinkError> {
        let Some(me) = self.numeric.as_deref() else {
            return Ok(());
        };
        let (Some(source), Some(target)) = (line.source(), line.get(2)) else {
            return Ok(());
        };
        if target != me && !irc_eq(target, &self.config.nick) {
            return Ok(());
        }
        let text = line.trailing(3).unwrap_or_default();
        let command = text.split_whitespace().next().unwrap_or_default();
        if command.eq_ignore_ascii_case("HELP") {
            for help in HELP_TEXT {
                ctx.send(format!("{} O {} :{}", me, source, help)).await?;
            }
        } else if !command.is_empty() {
            ctx.send(format!(
                "{} O {} :Unknown command {}. Try HELP.",
                me,
                source,
                command.to_ascii_uppercase()
            ))
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceModule for ChanServ {
    fn name(&self) -> &'static str {
        "chanserv"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn handshake(&mut self, ctx: &LinkContext) -> Result<(), LinkError> {
        let numeric = ctx
            .introduce_client(
                &self.config.nick,
                &self.config.ident,
                &self.config.host,
                "Channel Services",
            )
            .await?;
        self.numeric = Some(numeric);
        Ok(())
    }

    async fn parse_line(&mut self, ctx: &LinkContext, raw: &str) -> Result<(), LinkError> {
        let line = Line::parse(raw);
        if line.command() == Some("P") {
            self.handle_privmsg(ctx, &line).await?;
        }
        Ok(())
    }

    async fn handle_authentication(
        &mut self,
        ctx: &LinkContext,
        numeric: &str,
        account: &str,
        _server_numeric: &str,
    ) -> Result<(), LinkError> {
        let Some(me) = self.numeric.as_deref() else {
            return Ok(());
        };
        let Some(user) = ctx.state.get_user(numeric) else {
            return Ok(());
        };
        let mut channels: Vec<&String> = user.channels.iter().collect();
        channels.sort();
        for channel in channels {
            if !self.is_registered(channel) {
                continue;
            }
            let Some(chan) = ctx.state.get_channel(channel) else {
                continue;
            };
            if !chan.users.contains(me) {
                continue;
            }
            let flags = self.flags_for(channel, account);
            if flags.contains(AclFlags::BAN) {
                continue;
            }
            if flags.contains(AclFlags::AUTOOP) && !chan.ops.contains(numeric) {
                ctx.send(format!("{} M {} +o {}", me, channel, numeric)).await?;
                ctx.state.set_op(channel, numeric, true);
            } else if flags.contains(AclFlags::AUTOVOICE)
                && !flags.contains(AclFlags::AUTOOP)
                && !chan.voices.contains(numeric)
            {
                ctx.send(format!("{} M {} +v {}", me, channel, numeric)).await?;
                ctx.state.set_voice(channel, numeric, true);
            }
        }
        Ok(())
    }

    fn register_burst_channels(&mut self, bursts: &mut BurstMap, server_numeric: &str) {
        let Some(me) = self.numeric.clone() else {
            return;
        };
        for record in &self.registry {
            let ts = record.registered_ts.unwrap_or_else(now);
            bursts.entry(&record.name, ts, &record.modes).add(&me, MemberTag::Op);
        }
        debug!(
            server = %server_numeric,
            channels = self.registry.len(),
            "ChanServ burst channels registered"
        );
    }

    async fn post_load_initialization(&mut self, store: &dyn ServiceStore) -> Result<(), DbError> {
        self.registry = store.registered_channels().await?;
        self.access = store.channel_access().await?;
        info!(
            channels = self.registry.len(),
            access_entries = self.access.len(),
            "ChanServ registry loaded"
        );
        Ok(())
    }
}
