//! Trust-check admission control (`TC`/`TR`).
//!
//! A hub asks whether a connecting client may register. Rules are tried in
//! order and the first whose mask matches `ident@ip` decides:
//!
//! 1. `IDENT` when the rule wants an ident and the client has none
//! 2. `FAIL` when live connections from the IP reached the limit
//! 3. `ERROR` when connections with this ident on the host reached the limit
//! 4. `OK` otherwise
//!
//! No matching rule gives `IGNORED`.

use crate::config::TrustCheckConfig;
use crate::db::{ServiceStore, TrustRuleRecord};
use crate::security::mask::WildcardMask;
use crate::state::StateStore;
use parking_lot::RwLock;
use std::fmt;
use std::net::IpAddr;
use tracing::{info, warn};

/// Outcome of a trust evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustVerdict {
    /// Admitted. Carries the live count and the limit (0 = unlimited).
    Ok { live: usize, max: u32 },
    Fail,
    Ignored,
    Ident,
    Error,
}

impl TrustVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "OK",
            Self::Fail => "FAIL",
            Self::Ignored => "IGNORED",
            Self::Ident => "IDENT",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for TrustVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok { live, max } => write!(f, "OK {live} {max}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A parsed trust rule.
#[derive(Debug, Clone)]
pub struct TrustRule {
    pub mask: WildcardMask,
    /// 0 = unlimited.
    pub max_connections: u32,
    pub require_ident: bool,
    /// 0 = unlimited.
    pub max_idents_per_host: u32,
}

impl TrustRule {
    /// Build a rule from stored text fields. Unparseable numbers become 0.
    pub fn from_record(record: &TrustRuleRecord) -> Self {
        Self {
            mask: WildcardMask::new(&record.mask),
            max_connections: parse_limit(&record.max_connections, "max_connections", &record.mask),
            require_ident: parse_limit(&record.require_ident, "require_ident", &record.mask) != 0,
            max_idents_per_host: parse_limit(
                &record.max_idents_per_host,
                "max_idents_per_host",
                &record.mask,
            ),
        }
    }

    /// True if this rule applies to the client. A mask without `@` is
    /// matched against the whole `ident@ip` string as well.
    pub fn matches(&self, ident: &str, ip: &str) -> bool {
        self.mask.matches(&format!("{ident}@{ip}"))
    }
}

fn parse_limit(raw: &str, field: &str, mask: &str) -> u32 {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => 0,
        "true" | "yes" => 1,
        "false" | "no" => 0,
        _ => trimmed.parse().unwrap_or_else(|_| {
            warn!(mask = %mask, field = field, value = %raw, "Trust rule field is not a number, using 0");
            0
        }),
    }
}

/// Admission control: the configured rule set plus the live state it counts.
pub struct TrustCheck {
    evaluator: bool,
    rules: RwLock<Vec<TrustRule>>,
}

impl TrustCheck {
    /// Build from static config only.
    pub fn from_config(config: &TrustCheckConfig) -> Self {
        Self {
            evaluator: config.evaluator,
            rules: RwLock::new(config_rules(config)),
        }
    }

    /// Load rules from the store, falling back to config when the store has
    /// none or cannot be read.
    pub async fn load(config: &TrustCheckConfig, store: &dyn ServiceStore) -> Self {
        let check = Self::from_config(config);
        check.reload(config, store).await;
        check
    }

    /// Replace the rule set from the store (or config fallback).
    pub async fn reload(&self, config: &TrustCheckConfig, store: &dyn ServiceStore) {
        let rules = match store.trust_rules().await {
            Ok(records) if !records.is_empty() => {
                records.iter().map(TrustRule::from_record).collect()
            }
            Ok(_) => config_rules(config),
            Err(e) => {
                warn!(error = %e, "Failed to load trust rules, using config fallback");
                config_rules(config)
            }
        };
        info!(count = rules.len(), evaluator = self.evaluator, "Trust rules loaded");
        *self.rules.write() = rules;
    }

    /// Whether this node answers trust requests.
    pub fn is_evaluator(&self) -> bool {
        self.evaluator
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Evaluate a connecting client against the rules and live state.
    pub fn evaluate(&self, state: &StateStore, ident: &str, ip: IpAddr) -> TrustVerdict {
        let ident = if ident == "*" { "" } else { ident };
        let ip_text = ip.to_string();
        let rules = self.rules.read();
        let Some(rule) = rules.iter().find(|r| r.matches(ident, &ip_text)) else {
            return TrustVerdict::Ignored;
        };

        if rule.require_ident && ident.is_empty() {
            return TrustVerdict::Ident;
        }

        let live = state.connections_from(ip);
        if rule.max_connections > 0 && live >= rule.max_connections as usize {
            return TrustVerdict::Fail;
        }

        if rule.max_idents_per_host > 0
            && !ident.is_empty()
            && state.connections_from_ident(ip, ident) >= rule.max_idents_per_host as usize
        {
            return TrustVerdict::Error;
        }

        TrustVerdict::Ok {
            live,
            max: rule.max_connections,
        }
    }
}

fn config_rules(config: &TrustCheckConfig) -> Vec<TrustRule> {
    config
        .rules
        .iter()
        .map(|r| TrustRule {
            mask: WildcardMask::new(&r.mask),
            max_connections: r.max_connections,
            require_ident: r.require_ident,
            max_idents_per_host: r.max_idents_per_host,
        })
        .collect()
}
