//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway
//! and the route-table document it loads at startup. All types derive Serde
//! traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend API the gateway forwards to.
    pub backend: BackendConfig,

    /// Where the route table comes from.
    pub routing: RoutingConfig,

    /// API keys accepted by the static authenticator.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
        }
    }
}

/// Backend API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every resolved backend path is appended to.
    pub base_url: String,

    /// Fixed per-call timeout for backend requests, in milliseconds.
    pub request_timeout_ms: u64,

    /// Header carrying the tenant of the authenticated caller.
    pub tenant_header: String,

    /// Header carrying the backend token of the authenticated caller.
    pub token_header: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9130".to_string(),
            request_timeout_ms: 30_000,
            tenant_header: "x-okapi-tenant".to_string(),
            token_header: "x-okapi-token".to_string(),
        }
    }
}

/// Route table source and fixed endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// File path or http(s) URL of the route-table document.
    /// When unset the built-in table is used.
    pub api_config: Option<String>,

    /// Health check path; answered directly, never routed.
    pub health_path: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            api_config: None,
            health_path: "/admin/health".to_string(),
        }
    }
}

/// Static API-key authentication.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub api_keys: Vec<ApiKeyConfig>,
}

/// One accepted API key and the identity it maps to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub key: String,
    pub tenant: String,
    /// Token forwarded to the backend on behalf of this tenant.
    #[serde(default)]
    pub token: String,
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Route-table document.
///
/// Unknown fields are ignored so documents written for other deployments
/// still load.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiConfiguration {
    #[serde(default)]
    pub routing: Vec<RouteConfig>,
}

/// One raw route entry as it appears in the route-table document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Calling system identifier, matched against the `type` parameter.
    #[serde(rename = "type")]
    pub dialect: String,

    /// Inbound HTTP method.
    pub method: String,

    /// Inbound path pattern; `:name` segments become request parameters.
    pub path_pattern: String,

    /// Backend path template.
    pub proxy_path: String,

    /// Backend method, when it differs from the inbound one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_method: Option<String>,

    /// Query fragment AND-ed into the caller's `query` parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_query: Option<String>,

    /// Single status the backend must answer with for the call to count as a success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
}
