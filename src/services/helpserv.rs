//! HelpServ: a first-come first-served queue for the help channel.
//!
//! The queue is built purely from raw lines: joins and bursts add users,
//! parts, kicks, quits and kills remove them.

use super::traits::ServiceModule;
use crate::config::HelpServConfig;
use crate::error::LinkError;
use crate::sync::burst::{BurstMap, MemberTag};
use crate::sync::context::{LinkContext, now};
use async_trait::async_trait;
use slirc_p10::{BurstFields, Line, irc_eq};
use std::collections::VecDeque;
use tracing::debug;

pub struct HelpServ {
    config: HelpServConfig,
    numeric: Option<String>,
    queue: VecDeque<String>,
}

impl HelpServ {
    pub fn new(config: HelpServConfig) -> Self {
        Self {
            config,
            numeric: None,
            queue: VecDeque::new(),
        }
    }

    /// Waiting users, oldest first.
    pub fn queue(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    /// 1-based queue position.
    pub fn position(&self, numeric: &str) -> Option<usize> {
        self.queue.iter().position(|n| n == numeric).map(|p| p + 1)
    }

    fn is_help_channel(&self, channel: &str) -> bool {
        irc_eq(channel, &self.config.channel)
    }

    fn enqueue(&mut self, numeric: &str) -> Option<usize> {
        if self.numeric.as_deref() == Some(numeric) || self.position(numeric).is_some() {
            return None;
        }
        self.queue.push_back(numeric.to_string());
        Some(self.queue.len())
    }

    fn dequeue(&mut self, numeric: &str) {
        self.queue.retain(|n| n != numeric);
    }
}

#[async_trait]
impl ServiceModule for HelpServ {
    fn name(&self) -> &'static str {
        "helpserv"
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
                "Help Services",
            )
            .await?;
        self.numeric = Some(numeric);
        Ok(())
    }

    async fn parse_line(&mut self, ctx: &LinkContext, raw: &str) -> Result<(), LinkError> {
        let line = Line::parse(raw);
        let (Some(source), Some(command)) = (line.source(), line.command()) else {
            return Ok(());
        };

        match command {
            "J" | "C" => {
                let Some(list) = line.get(2) else {
                    return Ok(());
                };
                if list == "0" {
                    self.dequeue(source);
                    return Ok(());
                }
                if list.split(',').any(|c| self.is_help_channel(c))
                    && let Some(position) = self.enqueue(source)
                    && let Some(me) = self.numeric.as_deref()
                {
                    debug!(numeric = %source, position, "Queued for help");
                    ctx.send(format!(
                        "{} O {} :You are number {} in the help queue.",
                        me, source, position
                    ))
                    .await?;
                }
            }
            "B" => {
                let Some(fields) = BurstFields::parse(&line) else {
                    return Ok(());
                };
                if !self.is_help_channel(fields.channel) {
                    return Ok(());
                }
                for member in fields.member_list() {
                    if !ctx.is_local(&member.numeric) {
                        self.enqueue(&member.numeric);
                    }
                }
            }
            "L" => {
                if line
                    .get(2)
                    .is_some_and(|list| list.split(',').any(|c| self.is_help_channel(c)))
                {
                    self.dequeue(source);
                }
            }
            "K" => {
                if line.get(2).is_some_and(|c| self.is_help_channel(c))
                    && let Some(target) = line.get(3)
                {
                    self.dequeue(target);
                }
            }
            "Q" => self.dequeue(source),
            "D" => {
                if let Some(target) = line.get(2) {
                    self.dequeue(target);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn register_burst_channels(&mut self, bursts: &mut BurstMap, server_numeric: &str) {
        let Some(me) = self.numeric.as_deref() else {
            return;
        };
        bursts
            .entry(&self.config.channel, now(), "nt")
            .add(me, MemberTag::Op);
        debug!(server = %server_numeric, channel = %self.config.channel, "HelpServ burst channel registered");
    }
}
