//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_description() -> String {
    "Network Services".to_string()
}

/// Client capacity advertised in the SERVER line (three numeric characters).
pub fn default_max_clients() -> String {
    "]]]".to_string()
}

pub fn default_database_path() -> String {
    "services.db".to_string()
}

// =============================================================================
// Module Defaults
// =============================================================================

pub fn default_service_ident() -> String {
    "services".to_string()
}

pub fn default_service_host() -> String {
    "services.int".to_string()
}

pub fn default_chanserv_nick() -> String {
    "ChanServ".to_string()
}

pub fn default_helpserv_nick() -> String {
    "HelpServ".to_string()
}

pub fn default_helpserv_channel() -> String {
    "#help".to_string()
}

pub fn default_spamscan_nick() -> String {
    "SpamScan".to_string()
}

pub fn default_spamscan_reason() -> String {
    "Spam is not welcome on this network".to_string()
}
