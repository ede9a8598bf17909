//! User registration from `N` lines.
//!
//! Format:
//! `<server> N <nick> <hops> <ts> <ident> <host> [+<modes> [<mode args>...]] <ip> <numeric> :<realname>`
//!
//! Mode arguments are variable: `o` carries an oper name, `r` an
//! `account:ts[:id]` token and `h` a hidden `ident@host`. The IP and numeric
//! are always the two fields right before the realname, so they are located
//! from the end rather than by walking the modes.

use crate::error::LinkError;
use crate::metrics;
use crate::services::{ModuleRouter, NewUser};
use crate::state::{User, UserModes};
use crate::sync::context::{LinkContext, now};
use slirc_p10::{Line, decode_ip};
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Whether a registration should be passed on to other links.
///
/// There is only one link today, so nothing acts on this yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Propagate,
    Suppress,
}

/// Fields parsed from a full `N` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub server: String,
    pub nick: String,
    pub hops: u32,
    pub nick_ts: i64,
    pub ident: String,
    pub host: String,
    pub modes: UserModes,
    pub account: Option<String>,
    pub oper_name: Option<String>,
    pub hidden_host: Option<String>,
    pub ip: Option<IpAddr>,
    pub numeric: String,
    pub realname: String,
}

impl Registration {
    pub fn as_new_user(&self) -> NewUser<'_> {
        NewUser {
            numeric: &self.numeric,
            nick: &self.nick,
            ident: &self.ident,
            host: &self.host,
            account: self.account.as_deref(),
            hidden_host: self.hidden_host.as_deref(),
            realname: &self.realname,
        }
    }

    pub fn into_user(self) -> User {
        User {
            numeric: self.numeric,
            nick: self.nick,
            ident: self.ident,
            host: self.host,
            hidden_host: self.hidden_host,
            ip: self.ip,
            account: self.account,
            modes: self.modes,
            oper_name: self.oper_name,
            nick_ts: self.nick_ts,
            realname: self.realname,
            channels: HashSet::new(),
        }
    }

    /// Overwrite the mutable fields of an existing record, keeping its channels.
    fn apply_to(self, user: &mut User) {
        let channels = std::mem::take(&mut user.channels);
        *user = self.into_user();
        user.channels = channels;
    }
}

/// Parse a full `N` registration line. Returns `None` for malformed lines.
pub fn parse_registration(line: &Line<'_>) -> Option<Registration> {
    const FIRST_VARIABLE: usize = 7;

    let server = line.source()?;
    let realname_idx = line.trailing_index(FIRST_VARIABLE)?;
    if realname_idx < FIRST_VARIABLE + 2 {
        return None;
    }
    let ip_field = line.get(realname_idx - 2)?;
    let numeric = line.get(realname_idx - 1)?;

    let (modes_field, args) = match line.get(FIRST_VARIABLE) {
        Some(m) if m.starts_with('+') && FIRST_VARIABLE < realname_idx - 2 => (
            m,
            (FIRST_VARIABLE + 1..realname_idx - 2)
                .filter_map(|i| line.get(i))
                .collect::<Vec<_>>(),
        ),
        _ if realname_idx == FIRST_VARIABLE + 2 => ("", Vec::new()),
        _ => return None,
    };

    let mode_chars: Vec<char> = modes_field.chars().filter(|c| *c != '+').collect();

    // The account token is the colon-bearing one, wherever the modes put it.
    let account_pos = if mode_chars.contains(&'r') {
        args.iter().position(|a| a.contains(':'))
    } else {
        None
    };
    let mut positional = args
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != account_pos)
        .map(|(_, a)| *a);

    // Not every uplink sends an oper name, so `o` only takes a field when
    // one is left over after `h` (and a colon-less `r`) are served.
    let positional_count = args.len() - usize::from(account_pos.is_some());
    let required = mode_chars.iter().filter(|m| **m == 'h').count()
        + usize::from(mode_chars.contains(&'r') && account_pos.is_none());
    let oper_has_field = positional_count > required;

    let mut account = None;
    let mut oper_name = None;
    let mut hidden_host = None;
    for mode in mode_chars.iter().copied() {
        match mode {
            'r' => {
                let raw = match account_pos {
                    Some(pos) => Some(args[pos]),
                    None => positional.next(),
                };
                account = raw
                    .map(|a| a.split(':').next().unwrap_or(a).to_string())
                    .filter(|a| !a.is_empty());
            }
            'o' if oper_has_field => {
                oper_name = positional.next().map(str::to_string);
            }
            'h' => {
                hidden_host = positional
                    .next()
                    .map(|h| h.rsplit_once('@').map_or(h, |(_, host)| host).to_string());
            }
            _ => {}
        }
    }

    let ip = match decode_ip(ip_field) {
        Ok(ip) => Some(ip),
        Err(e) => {
            debug!(numeric = %numeric, ip = %ip_field, error = %e, "Undecodable client IP");
            None
        }
    };

    Some(Registration {
        server: server.to_string(),
        nick: line.get(2)?.to_string(),
        hops: line.get(3)?.parse().unwrap_or(1),
        nick_ts: line.get(4)?.parse().unwrap_or_default(),
        ident: line.get(5)?.to_string(),
        host: line.get(6)?.to_string(),
        modes: UserModes::from_mode_string(modes_field),
        account,
        oper_name,
        hidden_host,
        ip,
        numeric: numeric.to_string(),
        realname: line.trailing(FIRST_VARIABLE).unwrap_or_default().to_string(),
    })
}

/// Register (or refresh) a user from an `N` line.
///
/// Duplicate detection, module hooks and the commit all happen under the
/// registration lock. Last-seen persistence runs after it is released.
pub async fn register_user(
    ctx: &LinkContext,
    modules: &mut ModuleRouter,
    line: &Line<'_>,
) -> Result<Propagation, LinkError> {
    let Some(registration) = parse_registration(line) else {
        debug!(line = %line.raw(), "Dropping malformed N line");
        return Ok(Propagation::Suppress);
    };

    let committed = {
        let _guard = ctx.registration.lock().await;

        if let Some(existing) = ctx.state.get_user(&registration.numeric) {
            let privileged = existing.is_privileged()
                || registration.modes.service
                || registration.modes.oper;
            if privileged {
                warn!(
                    numeric = %registration.numeric,
                    existing = %existing.nick,
                    incoming = %registration.nick,
                    "Numeric collision involving a privileged user"
                );
            } else {
                debug!(numeric = %registration.numeric, "Refreshing existing user in place");
            }
            let numeric = registration.numeric.clone();
            ctx.state
                .update_user(&numeric, |user| registration.apply_to(user));
            metrics::record_registration("updated");
            return Ok(Propagation::Suppress);
        }

        if modules
            .handle_new_user(ctx, &registration.as_new_user())
            .await?
        {
            info!(nick = %registration.nick, numeric = %registration.numeric, "Registration handled by module");
            metrics::record_registration("rejected");
            return Ok(Propagation::Suppress);
        }

        let user = registration.into_user();
        ctx.state.insert_user(user.clone());
        metrics::record_registration("committed");
        user
    };

    if let Some(account) = &committed.account
        && let Err(e) = ctx
            .store
            .record_last_seen(account, &committed.host, now())
            .await
    {
        warn!(account = %account, error = %e, "Failed to record last seen");
    }

    Ok(Propagation::Propagate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpamScanConfig;
    use crate::services::{Module, SpamScan};
    use crate::sync::context::testing::test_link;

    fn parse(raw: &str) -> Registration {
        parse_registration(&Line::parse(raw)).unwrap()
    }

    fn loopback() -> Option<IpAddr> {
        Some("127.0.0.1".parse().unwrap())
    }

    // ========================================================================
    // Mode combinations
    // ========================================================================

    #[test]
    fn no_modes() {
        let r = parse("AB N Plain 1 1700000000 ident host.example B]AAAB ABAAA :Real Name");
        assert_eq!(r.nick, "Plain");
        assert_eq!(r.account, None);
        assert_eq!(r.hidden_host, None);
        assert_eq!(r.ip, loopback());
        assert_eq!(r.numeric, "ABAAA");
        assert_eq!(r.realname, "Real Name");
        assert_eq!(r.modes, UserModes::default());
    }

    #[test]
    fn oper() {
        let r = parse("AB N Oper 1 1700000000 ident host +iow opername B]AAAB ABAAB :Oper");
        assert_eq!(r.nick, "Oper");
        assert!(r.modes.oper);
        assert_eq!(r.oper_name.as_deref(), Some("opername"));
        assert_eq!(r.account, None);
        assert_eq!(r.hidden_host, None);
        assert_eq!(r.ip, loopback());
        assert_eq!(r.numeric, "ABAAB");
    }

    #[test]
    fn oper_without_oper_name() {
        let r = parse("AB N Oper 1 1700000000 ident host +io B]AAAB ABAAB :Oper");
        assert!(r.modes.oper);
        assert_eq!(r.oper_name, None);
        assert_eq!(r.numeric, "ABAAB");
    }

    #[test]
    fn account() {
        let r = parse("AB N Nick 1 1700000000 ident host +r Account:111:222 B]AAAB ABAAA :Real Name");
        assert_eq!(r.nick, "Nick");
        assert_eq!(r.account.as_deref(), Some("Account"));
        assert_eq!(r.hidden_host, None);
        assert_eq!(r.ip, Some(decode_ip("B]AAAB").unwrap()));
        assert_eq!(r.numeric, "ABAAA");
        assert!(r.modes.registered);
    }

    #[test]
    fn hidden_host() {
        let r = parse("AB N Hid 1 1700000000 ident host +xh fake@hidden.example B]AAAB ABAAC :Hidden");
        assert_eq!(r.nick, "Hid");
        assert_eq!(r.account, None);
        assert_eq!(r.hidden_host.as_deref(), Some("hidden.example"));
        assert_eq!(r.ip, loopback());
        assert_eq!(r.numeric, "ABAAC");
    }

    #[test]
    fn account_and_hidden_host() {
        let r = parse(
            "AB N Both 1 1700000000 ident host +rh Account:1:2 fake@hidden.example B]AAAB ABAAD :Both",
        );
        assert_eq!(r.nick, "Both");
        assert_eq!(r.account.as_deref(), Some("Account"));
        assert_eq!(r.hidden_host.as_deref(), Some("hidden.example"));
        assert_eq!(r.ip, loopback());
        assert_eq!(r.numeric, "ABAAD");
    }

    #[test]
    fn oper_account_and_hidden_host() {
        let r = parse(
            "AB N All 1 1700000000 ident host +orh opername Account:1:2 vhost@hidden.example B]AAAB ABAAE :All Three",
        );
        assert_eq!(r.nick, "All");
        assert_eq!(r.oper_name.as_deref(), Some("opername"));
        assert_eq!(r.account.as_deref(), Some("Account"));
        assert_eq!(r.hidden_host.as_deref(), Some("hidden.example"));
        assert_eq!(r.ip, loopback());
        assert_eq!(r.numeric, "ABAAE");
        assert_eq!(r.realname, "All Three");
    }

    #[test]
    fn account_found_by_colon_whatever_the_order() {
        let r = parse(
            "AB N All 1 1700000000 ident host +ohr opername vhost@hidden.example Account:1 B]AAAB ABAAE :x",
        );
        assert_eq!(r.oper_name.as_deref(), Some("opername"));
        assert_eq!(r.account.as_deref(), Some("Account"));
        assert_eq!(r.hidden_host.as_deref(), Some("hidden.example"));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(parse_registration(&Line::parse("AB N Nick 1 1700000000 ident host")).is_none());
        assert!(parse_registration(&Line::parse("AB N Nick 1 1700000000 ident host ABAAA :x")).is_none());
        assert!(
            parse_registration(&Line::parse("AB N Nick 1 1700000000 ident host junk B]AAAB ABAAA :x"))
                .is_none()
        );
    }

    #[test]
    fn undecodable_ip_is_kept_as_none() {
        let r = parse("AB N Nick 1 1700000000 ident host B]AAB ABAAA :Real");
        assert_eq!(r.ip, None);
        assert_eq!(r.numeric, "ABAAA");
    }

    // ========================================================================
    // Commit
    // ========================================================================

    #[tokio::test]
    async fn registration_commits_and_records_last_seen() {
        let link = test_link();
        let mut modules = ModuleRouter::new(Vec::new());
        let line = Line::parse("AB N Nick 1 1700000000 ident host +r Account:111:222 B]AAAB ABAAA :Real Name");

        let result = register_user(&link.ctx, &mut modules, &line).await.unwrap();

        assert_eq!(result, Propagation::Propagate);
        let user = link.ctx.state.get_user("ABAAA").unwrap();
        assert_eq!(user.account.as_deref(), Some("Account"));
        assert_eq!(link.store.last_seen("Account").unwrap().host, "host");
    }

    #[tokio::test]
    async fn duplicate_numeric_updates_in_place() {
        let link = test_link();
        let mut modules = ModuleRouter::new(Vec::new());
        let first = Line::parse("AB N First 1 1700000000 ident host B]AAAB ABAAA :One");
        let second = Line::parse("AB N Second 1 1700000001 other host2 +o B]AAAB ABAAA :Two");

        register_user(&link.ctx, &mut modules, &first).await.unwrap();
        link.ctx.state.add_member("#rust", "ABAAA", 1);
        let result = register_user(&link.ctx, &mut modules, &second).await.unwrap();

        assert_eq!(result, Propagation::Suppress);
        assert_eq!(link.ctx.state.user_count(), 1);
        let user = link.ctx.state.get_user("ABAAA").unwrap();
        assert_eq!(user.nick, "Second");
        assert!(user.modes.oper);
        assert!(user.channels.contains("#rust"));
    }

    #[tokio::test]
    async fn module_veto_aborts_registration() {
        let link = test_link();
        let config = SpamScanConfig {
            enabled: true,
            masks: vec!["*!*@*.spam.example".into()],
            ..SpamScanConfig::default()
        };
        let mut modules = ModuleRouter::new(vec![Module::SpamScan(SpamScan::new(config))]);
        modules.handshake(&link.ctx).await.unwrap();
        link.writer.take();

        let line = Line::parse("AB N Bot 1 1700000000 bot host.spam.example B]AAAB ABAAA :bot");
        let result = register_user(&link.ctx, &mut modules, &line).await.unwrap();

        assert_eq!(result, Propagation::Suppress);
        assert!(!link.ctx.state.has_user("ABAAA"));
        assert!(link.writer.lines().iter().any(|l| l.contains(" D ABAAA ")));
    }
}
