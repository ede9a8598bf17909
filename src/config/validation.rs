//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use slirc_p10::numeric::{char_value, is_server_numeric};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("server.numeric must be two P10 base64 characters, got '{0}'")]
    InvalidNumeric(String),
    #[error("server.max_clients must be three P10 base64 characters, got '{0}'")]
    InvalidMaxClients(String),
    #[error("uplink.address must be host:port, got '{0}'")]
    InvalidUplinkAddress(String),
    #[error("helpserv.channel must start with '#', got '{0}'")]
    InvalidHelpChannel(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    if !is_server_numeric(&config.server.numeric) {
        errors.push(ValidationError::InvalidNumeric(config.server.numeric.clone()));
    }

    let max = &config.server.max_clients;
    if max.len() != 3 || !max.bytes().all(|b| char_value(b).is_some()) {
        errors.push(ValidationError::InvalidMaxClients(max.clone()));
    }

    match config.uplink.address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
        _ => errors.push(ValidationError::InvalidUplinkAddress(
            config.uplink.address.clone(),
        )),
    }

    let help = &config.modules.helpserv;
    if help.enabled && !help.channel.starts_with('#') {
        errors.push(ValidationError::InvalidHelpChannel(help.channel.clone()));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(numeric: &str, address: &str) -> Config {
        let text = format!(
            "[server]\nname = \"services.example.net\"\nnumeric = \"{numeric}\"\n\
             [uplink]\naddress = \"{address}\"\npassword = \"pw\"\n"
        );
        toml::from_str(&text).unwrap()
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&config("AS", "127.0.0.1:4400")).is_ok());
        assert!(validate(&config("]]", "hub.example.net:4400")).is_ok());
    }

    #[test]
    fn bad_numeric_is_rejected() {
        let errors = validate(&config("A", "127.0.0.1:4400")).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidNumeric(_)));
        let errors = validate(&config("A-", "127.0.0.1:4400")).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidNumeric(_)));
    }

    #[test]
    fn bad_address_is_rejected() {
        let errors = validate(&config("AS", "localhost")).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidUplinkAddress(_)));
    }
}
