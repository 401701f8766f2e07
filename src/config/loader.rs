//! Configuration loading from disk or over HTTP.

use std::fs;
use std::path::Path;

use crate::config::schema::{ApiConfiguration, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Route table used when no `routing.api_config` source is configured.
const DEFAULT_API_CONFIGURATION: &str = include_str!("../../resources/api_configuration.json");

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Json(serde_json::Error),
    Fetch(reqwest::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Json(e) => write!(f, "API configuration parse error: {}", e),
            ConfigError::Fetch(e) => write!(f, "API configuration fetch error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the route-table document.
///
/// `None` selects the built-in table; an `http://` or `https://` source
/// (scheme compared case-insensitively) is fetched once; anything else is
/// read as a file path.
pub async fn load_api_configuration(source: Option<&str>) -> Result<ApiConfiguration, ConfigError> {
    let Some(source) = source else {
        tracing::warn!("No API configuration specified, using the built-in route table");
        return parse_api_configuration(DEFAULT_API_CONFIGURATION);
    };

    let content = if is_url(source) {
        let response = reqwest::get(source)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(ConfigError::Fetch)?;
        response.text().await.map_err(ConfigError::Fetch)?
    } else {
        fs::read_to_string(source).map_err(ConfigError::Io)?
    };

    let config = parse_api_configuration(&content)?;
    tracing::info!(source = %source, routes = config.routing.len(), "API configuration loaded");
    Ok(config)
}

/// Parse a route-table document from JSON.
pub fn parse_api_configuration(content: &str) -> Result<ApiConfiguration, ConfigError> {
    serde_json::from_str(content).map_err(ConfigError::Json)
}

fn is_url(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [backend]
            base_url = "http://backend:9130"

            [[auth.api_keys]]
            key = "secret"
            tenant = "diku"
            token = "t0k3n"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.backend.base_url, "http://backend:9130");
        assert_eq!(config.backend.request_timeout_ms, 30_000);
        assert_eq!(config.routing.health_path, "/admin/health");
        assert_eq!(config.auth.api_keys[0].tenant, "diku");
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = parse_config("[backend]\nrequest_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().starts_with("Validation failed"));

        assert!(matches!(parse_config("listener = 5"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_builtin_api_configuration_parses() {
        let config = parse_api_configuration(DEFAULT_API_CONFIGURATION).unwrap();
        assert!(!config.routing.is_empty());
        assert!(config
            .routing
            .iter()
            .any(|r| r.dialect == "GOBI" && r.path_pattern == "/orders/validate"));
    }

    #[test]
    fn test_api_configuration_ignores_unknown_fields() {
        let config = parse_api_configuration(
            r#"{"routing":[{"type":"COMMON","method":"GET","pathPattern":"/funds",
                "proxyPath":"/finance/funds","description":"ignored"}],"version":2}"#,
        )
        .unwrap();
        assert_eq!(config.routing.len(), 1);
        assert_eq!(config.routing[0].proxy_path, "/finance/funds");
        assert_eq!(config.routing[0].proxy_method, None);
    }

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://config.example.com/api.json"));
        assert!(is_url("HTTP://config/api.json"));
        assert!(!is_url("/etc/gateway/api.json"));
    }

    #[tokio::test]
    async fn test_load_builtin_and_missing_file() {
        let config = load_api_configuration(None).await.unwrap();
        assert!(!config.routing.is_empty());

        let err = load_api_configuration(Some("/definitely/not/here.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
