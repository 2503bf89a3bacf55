use std::collections::HashSet;

use crate::routing::split_mapping_entry;

use super::{AppConfig, ConfigError, GatewayConfig};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_gateways(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.connect_timeout == 0 {
        return Err(validation_err(
            "server.connect_timeout must be greater than 0",
        ));
    }
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_gateways(config: &AppConfig) -> Result<(), ConfigError> {
    if config.gateways.is_empty() {
        return Err(validation_err("gateways cannot be empty"));
    }

    let mut ids = HashSet::new();
    let mut tokens = HashSet::new();
    for gateway in &config.gateways {
        if !ids.insert(gateway.id) {
            return Err(validation_err(format!(
                "duplicate gateway id {}",
                gateway.id
            )));
        }
        validate_gateway(gateway)?;
        if !tokens.insert(gateway.auth_token.as_str()) {
            return Err(validation_err(format!(
                "Gateway {}: auth_token is already used by another gateway",
                gateway.id
            )));
        }
    }
    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    let id = gateway.id;
    if gateway.auth_token.trim().is_empty() {
        return Err(validation_err(format!(
            "Gateway {id}: auth_token cannot be empty"
        )));
    }
    if gateway.upstream_api_key.trim().is_empty() {
        return Err(validation_err(format!(
            "Gateway {id}: upstream_api_key cannot be empty"
        )));
    }

    let parsed = url::Url::parse(gateway.upstream_base_url.trim()).map_err(|err| {
        validation_err(format!(
            "Gateway {id}: upstream_base_url is not a valid URL: {err}"
        ))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "Gateway {id}: upstream_base_url must use http:// or https://"
        )));
    }

    let custom = gateway.custom_model_name.as_deref().map(str::trim);
    let upstream = gateway.upstream_model.as_deref().map(str::trim);
    match (custom, upstream) {
        (None, None) => {}
        (Some(c), Some(u)) if !c.is_empty() && !u.is_empty() => {}
        _ => {
            return Err(validation_err(format!(
                "Gateway {id}: custom_model_name and upstream_model must be set together and non-empty"
            )));
        }
    }

    for entry in &gateway.model_mapping {
        if split_mapping_entry(entry).is_none() {
            return Err(validation_err(format!(
                "Gateway {id}: invalid model_mapping entry '{entry}'. Expected 'caller:provider' with both parts non-empty."
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}
