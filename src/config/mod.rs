//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, UplinkConfig)
//! - [`trust`]: Trust-check evaluator settings and fallback rules
//! - [`modules`]: Per-module service client settings
//! - [`validation`]: Startup validation of numerics and addresses

mod defaults;
mod modules;
mod trust;
mod types;
mod validation;

pub use modules::{ChanServConfig, HelpServConfig, ModulesConfig, SpamScanConfig};
pub use trust::{TrustCheckConfig, TrustRuleConfig};
pub use types::{Config, ConfigError, DatabaseConfig, ServerConfig, UplinkConfig};
pub use validation::{ValidationError, validate};
