//! Inbound line dispatch.
//!
//! Every line goes through core handling first (state mirror, registration,
//! burst, trust-check) and is then handed unmodified to every enabled module,
//! whether or not the core understood it.

use crate::error::LinkError;
use crate::metrics;
use crate::security::TrustCheck;
use crate::services::ModuleRouter;
use crate::state::Server;
use crate::sync::burst::{BurstMap, run_burst};
use crate::sync::context::{LinkContext, now};
use crate::sync::handshake::{HandshakeMachine, HandshakeState};
use crate::sync::registrar::{Propagation, register_user};
use crate::telemetry::{CommandTimer, spans};
use slirc_p10::numeric::{SERVER_NUMERIC_LEN, server_of};
use slirc_p10::{BurstFields, Line, decode_ip};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{Instrument, debug, info, trace, warn};

/// Routes inbound lines for one link.
pub struct Dispatcher {
    modules: ModuleRouter,
    handshake: HandshakeMachine,
    trust: Arc<TrustCheck>,
    bursts: BurstMap,
    burst_done: bool,
}

impl Dispatcher {
    pub fn new(modules: ModuleRouter, handshake: HandshakeMachine, trust: Arc<TrustCheck>) -> Self {
        Self {
            modules,
            handshake,
            trust,
            bursts: BurstMap::new(),
            burst_done: false,
        }
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state
    }

    /// True once our burst has gone out.
    pub fn is_burst_done(&self) -> bool {
        self.burst_done
    }

    /// Open the link: introduce ourselves, let modules introduce their
    /// clients and collect their channels, then end our burst with `EB`.
    pub async fn start(&mut self, ctx: &LinkContext, started: i64) -> Result<(), LinkError> {
        for line in self.handshake.introduction(started, now()) {
            ctx.send(line).await?;
        }
        self.modules.handshake(ctx).await?;
        self.modules
            .register_burst_channels(&mut self.bursts, &ctx.numeric);
        info!(channels = self.bursts.len(), "Burst channels registered");
        ctx.send(format!("{} EB", ctx.numeric)).await
    }

    /// Handle one raw inbound line.
    pub async fn dispatch(&mut self, ctx: &LinkContext, raw: &str) -> Result<(), LinkError> {
        let line = Line::parse(raw);
        if line.is_empty() {
            return Ok(());
        }
        let result = match line.command() {
            Some(command) => {
                let _timer = CommandTimer::new(command);
                let span = spans::command(command, line.source());
                self.handle(ctx, &line, command).instrument(span).await
            }
            None => {
                debug!(line = %line.raw(), "Dropping line without command");
                Ok(())
            }
        };
        let delivered = self.modules.parse_line(ctx, line.raw()).await;
        result.and(delivered)
    }

    async fn handle(
        &mut self,
        ctx: &LinkContext,
        line: &Line<'_>,
        command: &str,
    ) -> Result<(), LinkError> {
        if line.is_unprefixed() {
            return self.handle_unprefixed(ctx, line, command);
        }

        match command {
            "N" => self.handle_nick(ctx, line).await,
            "B" => {
                handle_burst(ctx, line);
                Ok(())
            }
            "J" => {
                handle_join(ctx, line);
                Ok(())
            }
            "C" => {
                handle_create(ctx, line);
                Ok(())
            }
            "L" => {
                handle_part(ctx, line);
                Ok(())
            }
            "K" => {
                handle_kick(ctx, line);
                Ok(())
            }
            "M" | "OM" => {
                handle_mode(ctx, line);
                Ok(())
            }
            "T" => {
                handle_topic(ctx, line);
                Ok(())
            }
            "Q" => {
                if let Some(source) = line.source() {
                    ctx.state.remove_user(source);
                }
                Ok(())
            }
            "D" => {
                if let Some(target) = line.get(2)
                    && ctx.state.remove_user(target).is_some()
                {
                    debug!(numeric = %target, "User killed");
                }
                Ok(())
            }
            "AC" => self.handle_account(ctx, line).await,
            "G" => {
                let reply = match line.rest_from(2) {
                    Some(args) => format!("{} Z {} {}", ctx.numeric, ctx.numeric, args),
                    None => format!("{} Z {}", ctx.numeric, ctx.numeric),
                };
                ctx.send(reply).await
            }
            "EB" => self.handle_end_of_burst(ctx).await,
            "EA" => {
                debug!(source = ?line.source(), "Burst acknowledged");
                Ok(())
            }
            "TC" => self.handle_trust_check(ctx, line).await,
            "TR" => {
                debug!(line = %line.raw(), "Trust-check reply");
                Ok(())
            }
            "S" => {
                handle_server(ctx, line);
                Ok(())
            }
            "SQ" => {
                handle_squit(ctx, line);
                Ok(())
            }
            _ => {
                trace!(command = %command, "Unhandled command");
                Ok(())
            }
        }
    }

    fn handle_unprefixed(
        &mut self,
        ctx: &LinkContext,
        line: &Line<'_>,
        command: &str,
    ) -> Result<(), LinkError> {
        match command {
            "PASS" => {
                self.handshake.on_pass(line);
                Ok(())
            }
            "SERVER" => match self.handshake.on_server(line) {
                Ok(server) => {
                    info!(numeric = %server.numeric, name = %server.name, "Uplink introduced");
                    ctx.state.add_server(server);
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "Uplink handshake failed");
                    Err(LinkError::Rejected(e.to_string()))
                }
            },
            "ERROR" => {
                let reason = line.trailing(1).or_else(|| line.get(1)).unwrap_or("ERROR");
                warn!(reason = %reason, "Uplink sent ERROR");
                Err(LinkError::Rejected(reason.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn handle_nick(&mut self, ctx: &LinkContext, line: &Line<'_>) -> Result<(), LinkError> {
        if line.len() <= 4 {
            let (Some(source), Some(nick)) = (line.source(), line.get(2)) else {
                return Ok(());
            };
            let ts = line.get(3).and_then(|t| t.parse().ok()).unwrap_or_else(now);
            if !ctx.state.rename_user(source, nick, ts) {
                debug!(numeric = %source, "Nick change for unknown user");
            }
            return Ok(());
        }
        if line.len() < 8 {
            debug!(line = %line.raw(), "Dropping short N line");
            return Ok(());
        }
        let propagation = register_user(ctx, &mut self.modules, line).await?;
        self.propagate(line, propagation);
        Ok(())
    }

    /// Pass a line on to other links. There is only the uplink today.
    fn propagate(&self, line: &Line<'_>, propagation: Propagation) {
        if propagation == Propagation::Propagate {
            trace!(line = %line.raw(), "No downstream links to propagate to");
        }
    }

    /// `<src> AC <target> <account>` or `<src> AC <target> R|M|U [<account> ...]`
    async fn handle_account(&mut self, ctx: &LinkContext, line: &Line<'_>) -> Result<(), LinkError> {
        let (Some(source), Some(target), Some(kind)) = (line.source(), line.get(2), line.get(3))
        else {
            return Ok(());
        };
        let account = match kind {
            "R" | "M" => line.get(4),
            "U" => {
                ctx.state.set_account(target, None);
                return Ok(());
            }
            bare => Some(bare),
        };
        let Some(account) = account else {
            return Ok(());
        };
        // `name:ts[:id]` carries more than the name.
        let account = account.split(':').next().unwrap_or(account);

        if !ctx.state.set_account(target, Some(account.to_string())) {
            debug!(numeric = %target, "Account for unknown user");
            return Ok(());
        }
        info!(numeric = %target, account = %account, "User authenticated");

        self.modules
            .handle_authentication(ctx, target, account, server_of(source))
            .await
    }

    async fn handle_end_of_burst(&mut self, ctx: &LinkContext) -> Result<(), LinkError> {
        if self.burst_done {
            debug!("Ignoring repeated EB");
            return Ok(());
        }
        self.burst_done = true;
        run_burst(ctx, &mut self.bursts).await?;
        self.handshake.on_end_of_burst();
        info!(
            users = ctx.state.user_count(),
            channels = ctx.state.channel_count(),
            servers = ctx.state.server_count(),
            "Link synced"
        );
        Ok(())
    }

    /// `<src> TC <target> <cookie> <ident|*> <ip>`
    async fn handle_trust_check(&self, ctx: &LinkContext, line: &Line<'_>) -> Result<(), LinkError> {
        if !self.trust.is_evaluator() {
            trace!("Not the trust-check evaluator; ignoring TC");
            return Ok(());
        }
        let (Some(source), Some(target), Some(cookie), Some(ident), Some(ip_field)) = (
            line.source(),
            line.get(2),
            line.get(3),
            line.get(4),
            line.get(5),
        ) else {
            debug!(line = %line.raw(), "Dropping short TC line");
            return Ok(());
        };
        if target != ctx.numeric && !target.eq_ignore_ascii_case(&ctx.server_name) {
            return Ok(());
        }

        let ip = ip_field
            .parse::<IpAddr>()
            .ok()
            .or_else(|| decode_ip(ip_field).ok());
        let verdict = match ip {
            Some(ip) => self.trust.evaluate(&ctx.state, ident, ip).to_string(),
            None => {
                debug!(ip = %ip_field, "Unreadable TC address");
                "ERROR".to_string()
            }
        };
        metrics::record_trust_verdict(verdict.split(' ').next().unwrap_or("ERROR"));
        ctx.send(format!("{} TR {} {} {}", ctx.numeric, source, cookie, verdict))
            .await
    }
}

// ============================================================================
// State handlers
// ============================================================================

/// `<src> B <chan> <ts> [+modes [args...]] [members] [:%bans]`
fn handle_burst(ctx: &LinkContext, line: &Line<'_>) {
    let Some(fields) = BurstFields::parse(line) else {
        debug!(line = %line.raw(), "Dropping short B line");
        return;
    };
    let ts = fields.timestamp.parse().unwrap_or(0);
    ctx.state
        .merge_burst(fields.channel, ts, fields.modes, &fields.member_list());
}

/// `<src> J <chan>[,<chan>...] [<ts>]`, or `J 0` to leave everything.
fn handle_join(ctx: &LinkContext, line: &Line<'_>) {
    let (Some(source), Some(list)) = (line.source(), line.get(2)) else {
        return;
    };
    if list == "0" {
        ctx.state.part_all(source);
        return;
    }
    let ts = line.get(3).and_then(|t| t.parse().ok()).unwrap_or_else(now);
    for channel in list.split(',').filter(|c| !c.is_empty()) {
        ctx.state.add_member(channel, source, ts);
    }
}

/// `<src> C <chan>[,<chan>...] <ts>`
fn handle_create(ctx: &LinkContext, line: &Line<'_>) {
    let (Some(source), Some(list)) = (line.source(), line.get(2)) else {
        return;
    };
    let ts = line.get(3).and_then(|t| t.parse().ok()).unwrap_or_else(now);
    for channel in list.split(',').filter(|c| !c.is_empty()) {
        ctx.state.add_member(channel, source, ts);
        ctx.state.set_op(channel, source, true);
    }
}

/// `<src> L <chan>[,<chan>...] [:<reason>]`
fn handle_part(ctx: &LinkContext, line: &Line<'_>) {
    let (Some(source), Some(list)) = (line.source(), line.get(2)) else {
        return;
    };
    for channel in list.split(',').filter(|c| !c.is_empty()) {
        ctx.state.remove_member(channel, source);
    }
}

/// `<src> K <chan> <target> :<reason>`
fn handle_kick(ctx: &LinkContext, line: &Line<'_>) {
    if let (Some(channel), Some(target)) = (line.get(2), line.get(3)) {
        ctx.state.remove_member(channel, target);
    }
}

/// `<src> M <chan> <modes> [args...]` or `<src> M <nick> :<modes> [args]`
fn handle_mode(ctx: &LinkContext, line: &Line<'_>) {
    let (Some(target), Some(modes)) = (line.get(2), line.get(3)) else {
        return;
    };
    if target.starts_with('#') || target.starts_with('&') {
        apply_channel_modes(ctx, target, modes, line.tokens_from(4));
    } else {
        apply_user_modes(ctx, target, modes.trim_start_matches(':'), line.tokens_from(4));
    }
}

fn apply_channel_modes(ctx: &LinkContext, channel: &str, modes: &str, args: Vec<&str>) {
    let mut args = args.into_iter();
    let mut adding = true;
    for c in modes.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            'o' | 'v' => {
                let Some(numeric) = args.next() else {
                    continue;
                };
                if c == 'o' {
                    ctx.state.set_op(channel, numeric, adding);
                } else {
                    ctx.state.set_voice(channel, numeric, adding);
                }
            }
            'b' => {
                args.next();
            }
            'k' | 'A' | 'U' => {
                args.next();
                ctx.state.set_channel_mode(channel, c, adding);
            }
            'l' => {
                if adding {
                    args.next();
                }
                ctx.state.set_channel_mode(channel, c, adding);
            }
            _ => {
                ctx.state.set_channel_mode(channel, c, adding);
            }
        }
    }
}

fn apply_user_modes(ctx: &LinkContext, target: &str, modes: &str, args: Vec<&str>) {
    let numeric = match ctx.state.find_by_nick(target) {
        Some(user) => user.numeric,
        None if ctx.state.has_user(target) => target.to_string(),
        None => {
            debug!(target = %target, "Mode for unknown user");
            return;
        }
    };
    let hidden = if modes.contains('h') {
        args.first()
            .map(|a| a.rsplit_once('@').map_or(*a, |(_, host)| host).to_string())
    } else {
        None
    };
    ctx.state.update_user(&numeric, |user| {
        user.modes.apply(modes);
        if let Some(host) = hidden {
            user.hidden_host = Some(host);
        }
        if !user.modes.oper {
            user.oper_name = None;
        }
    });
}

/// `<src> T <chan> [<chan ts> <topic ts>] :<topic>`
fn handle_topic(ctx: &LinkContext, line: &Line<'_>) {
    let Some(channel) = line.get(2) else {
        return;
    };
    let topic = line.trailing(3).map(str::to_string);
    ctx.state.set_topic(channel, topic);
}

/// `<src> S <name> <hops> <start> <link> <proto> <numeric><max> <flags> :<desc>`
fn handle_server(ctx: &LinkContext, line: &Line<'_>) {
    let (Some(source), Some(name), Some(hops), Some(numeric_field)) =
        (line.source(), line.get(2), line.get(3), line.get(7))
    else {
        debug!(line = %line.raw(), "Dropping short S line");
        return;
    };
    let Some(numeric) = numeric_field.get(..SERVER_NUMERIC_LEN) else {
        return;
    };
    info!(numeric = %numeric, name = %name, uplink = %source, "Server introduced");
    ctx.state.add_server(Server {
        numeric: numeric.to_string(),
        name: name.to_string(),
        uplink: Some(server_of(source).to_string()),
        hops: hops.parse().unwrap_or(1),
    });
}

/// `<src> SQ <name> <ts> :<reason>`
fn handle_squit(ctx: &LinkContext, line: &Line<'_>) {
    let Some(name) = line.get(2) else {
        return;
    };
    let server = ctx
        .state
        .find_server_by_name(name)
        .or_else(|| ctx.state.get_server(name));
    let Some(server) = server else {
        debug!(name = %name, "SQ for unknown server");
        return;
    };
    let gone = ctx.state.remove_server(&server.numeric);
    info!(name = %server.name, users = gone.len(), "Server split");
}
