//! Service module configuration.

use serde::Deserialize;

use super::defaults::{
    default_chanserv_nick, default_helpserv_channel, default_helpserv_nick,
    default_service_host, default_service_ident, default_spamscan_nick, default_spamscan_reason,
    default_true,
};

/// All module blocks. Missing blocks take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModulesConfig {
    #[serde(default)]
    pub chanserv: ChanServConfig,
    #[serde(default)]
    pub helpserv: HelpServConfig,
    #[serde(default)]
    pub spamscan: SpamScanConfig,
}

/// Channel registration service.
#[derive(Debug, Clone, Deserialize)]
pub struct ChanServConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_chanserv_nick")]
    pub nick: String,
    #[serde(default = "default_service_ident")]
    pub ident: String,
    #[serde(default = "default_service_host")]
    pub host: String,
}

impl Default for ChanServConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nick: default_chanserv_nick(),
            ident: default_service_ident(),
            host: default_service_host(),
        }
    }
}

/// Help queue service.
#[derive(Debug, Clone, Deserialize)]
pub struct HelpServConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_helpserv_nick")]
    pub nick: String,
    #[serde(default = "default_service_ident")]
    pub ident: String,
    #[serde(default = "default_service_host")]
    pub host: String,
    /// Channel whose members are queued for help.
    #[serde(default = "default_helpserv_channel")]
    pub channel: String,
}

impl Default for HelpServConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            nick: default_helpserv_nick(),
            ident: default_service_ident(),
            host: default_service_host(),
            channel: default_helpserv_channel(),
        }
    }
}

/// Spam scanning service.
#[derive(Debug, Clone, Deserialize)]
pub struct SpamScanConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_spamscan_nick")]
    pub nick: String,
    #[serde(default = "default_service_ident")]
    pub ident: String,
    #[serde(default = "default_service_host")]
    pub host: String,
    /// `nick!ident@host` wildcard masks.
    #[serde(default)]
    pub masks: Vec<String>,
    /// Case-insensitive substrings checked against the realname.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Kill reason.
    #[serde(default = "default_spamscan_reason")]
    pub reason: String,
}

impl Default for SpamScanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            nick: default_spamscan_nick(),
            ident: default_service_ident(),
            host: default_service_host(),
            masks: Vec::new(),
            keywords: Vec::new(),
            reason: default_spamscan_reason(),
        }
    }
}
