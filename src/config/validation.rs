//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the backend URL, header names and the API-key list
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("backend.base_url: '{0}' is not a plain http URL")]
    InvalidBackendUrl(String),

    #[error("{field}: '{value}' is not a valid header name")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("routing.health_path: '{0}' must start with '/'")]
    InvalidHealthPath(String),

    #[error("auth.api_keys[{0}]: key must not be empty")]
    EmptyApiKey(usize),

    #[error("auth.api_keys[{0}]: tenant must not be empty")]
    EmptyTenant(usize),

    #[error("auth.api_keys[{0}]: duplicate key")]
    DuplicateApiKey(usize),

    #[error("observability.log_format: '{0}' is not one of pretty, json")]
    InvalidLogFormat(String),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    match Url::parse(&config.backend.base_url) {
        Ok(url) if url.scheme() == "http" => {}
        _ => errors.push(ValidationError::InvalidBackendUrl(
            config.backend.base_url.clone(),
        )),
    }

    for (field, value) in [
        ("backend.tenant_header", &config.backend.tenant_header),
        ("backend.token_header", &config.backend.token_header),
    ] {
        if HeaderName::from_bytes(value.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                field,
                value: value.clone(),
            });
        }
    }

    if config.backend.request_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("backend.request_timeout_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroValue("security.max_body_size"));
    }

    if !config.routing.health_path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(
            config.routing.health_path.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, api_key) in config.auth.api_keys.iter().enumerate() {
        if api_key.key.is_empty() {
            errors.push(ValidationError::EmptyApiKey(i));
        } else if !seen.insert(api_key.key.as_str()) {
            errors.push(ValidationError::DuplicateApiKey(i));
        }
        if api_key.tenant.is_empty() {
            errors.push(ValidationError::EmptyTenant(i));
        }
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::InvalidLogFormat(
            config.observability.log_format.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
