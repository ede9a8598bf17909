//! Records exchanged with the persistent store.

/// A registered channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    /// Channel name as registered.
    pub name: String,
    /// Registration time. `None` when unset or unreadable.
    pub registered_ts: Option<i64>,
    /// Modes to burst with, without sign (e.g. "nt").
    pub modes: String,
    /// Stored topic, applied when the live channel has none.
    pub topic: Option<String>,
}

/// One account's access flags on one channel.
///
/// `flags` is kept as stored text and parsed by the consumer, so a corrupt
/// value degrades to "no flags" instead of failing the whole read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub channel: String,
    pub account: String,
    pub flags: String,
}

/// A trust rule as stored. Numeric fields are text, parsed at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRuleRecord {
    pub mask: String,
    pub max_connections: String,
    pub require_ident: String,
    pub max_idents_per_host: String,
}

/// Last place and time an account was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSeen {
    pub account: String,
    pub host: String,
    pub ts: i64,
}
