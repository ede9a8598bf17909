//! Trust-check configuration.

use serde::Deserialize;

/// Trust-check settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrustCheckConfig {
    /// Whether this node answers TC requests. Non-evaluators stay silent.
    #[serde(default)]
    pub evaluator: bool,
    /// Fallback rules, used when the store holds none.
    #[serde(default, rename = "rule")]
    pub rules: Vec<TrustRuleConfig>,
}

/// One static trust rule.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustRuleConfig {
    /// `ident@ip` wildcard mask.
    pub mask: String,
    /// Maximum concurrent connections from a matching IP (0 = unlimited).
    #[serde(default)]
    pub max_connections: u32,
    /// Reject connections without an ident.
    #[serde(default)]
    pub require_ident: bool,
    /// Maximum connections sharing one ident per host (0 = unlimited).
    #[serde(default)]
    pub max_idents_per_host: u32,
}
