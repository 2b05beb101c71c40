//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `auth.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "GATEWAY_JWT_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides and validate a TOML document.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    finalize(config)
}

/// Built-in platform layout, for running without a config file.
pub fn load_defaults() -> Result<GatewayConfig, ConfigError> {
    finalize(GatewayConfig::default().with_platform_defaults())
}

fn finalize(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
        if !secret.is_empty() {
            config.auth.jwt_secret = secret;
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
