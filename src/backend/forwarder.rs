//! Forwarding policy over the raw backend call.
//!
//! # Responsibilities
//! - Accept only GET, POST and PUT
//! - Build the backend URL and the outbound header set
//! - Send blank payloads as no body
//! - Bound every call with the configured timeout
//! - Turn responses that break the route's status expectation into failures
//!
//! # Design Decisions
//! - Timeouts are distinct from transport errors
//! - No retries: backend errors are reported, never replayed
//! - Only the issuing task waits on the call; nothing here blocks a thread

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{
    header::{self, HeaderName, HeaderValue},
    HeaderMap, Method, StatusCode,
};
use tokio::time::timeout;
use url::Url;

use crate::backend::auth::Credentials;
use crate::backend::client::{BackendClient, BackendRequest, BackendResponse, ForwardError};
use crate::config::schema::BackendConfig;
use crate::error::{GatewayError, GatewayResult};

/// `Accept` sent when the caller did not supply one.
pub const DEFAULT_ACCEPT: &str = "application/json, application/xml, text/plain";

/// Inbound headers never copied to the backend.
const STRIPPED_HEADERS: [HeaderName; 11] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
    header::AUTHORIZATION,
];

/// One call to forward.
#[derive(Debug, Clone)]
pub struct Outbound<'a> {
    pub method: &'a Method,
    /// Resolved backend path, query included.
    pub path: &'a str,
    pub payload: Bytes,
    /// Caller headers, merged over the defaults.
    pub headers: &'a HeaderMap,
    pub credentials: &'a Credentials,
    /// The only status accepted as success, when the operation has one.
    pub expected_status: Option<StatusCode>,
}

/// Applies the forwarding policy and delegates the call to a [`BackendClient`].
#[derive(Clone)]
pub struct Forwarder {
    client: Arc<dyn BackendClient>,
    base_url: String,
    timeout: Duration,
    tenant_header: HeaderName,
    token_header: HeaderName,
}

impl Forwarder {
    pub fn new(client: Arc<dyn BackendClient>, config: &BackendConfig) -> GatewayResult<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            GatewayError::Internal(format!("invalid backend URL '{}': {}", config.base_url, e))
        })?;
        let header_name = |name: &str| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GatewayError::Internal(format!("invalid header name '{}': {}", name, e)))
        };
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.request_timeout_ms),
            tenant_header: header_name(&config.tenant_header)?,
            token_header: header_name(&config.token_header)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward one call to the backend.
    pub async fn forward(&self, outbound: Outbound<'_>) -> Result<BackendResponse, ForwardError> {
        let method = outbound.method;
        if !is_supported(method) {
            return Err(ForwardError::UnsupportedMethod(method.clone()));
        }

        let url = self.url_for(outbound.path)?;
        let body = if *method == Method::GET || is_blank(&outbound.payload) {
            None
        } else {
            Some(outbound.payload)
        };

        let request = BackendRequest {
            method: method.clone(),
            url,
            tenant: outbound.credentials.tenant.clone(),
            body,
            headers: self.outbound_headers(outbound.headers, outbound.credentials),
        };

        tracing::info!(
            method = %request.method,
            url = %request.url,
            tenant = %request.tenant,
            has_body = request.body.is_some(),
            "Forwarding request to backend"
        );

        let response = match timeout(self.timeout, self.client.call(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(ForwardError::Timeout(self.timeout)),
        };

        match outbound.expected_status {
            Some(expected) if response.status != expected => {
                Err(ForwardError::UnexpectedStatus { expected, response })
            }
            _ => Ok(response),
        }
    }

    fn url_for(&self, path: &str) -> Result<Url, ForwardError> {
        let joined = format!("{}{}", self.base_url, path);
        Url::parse(&joined).map_err(|e| ForwardError::Transport(format!("invalid backend URL '{}': {}", joined, e)))
    }

    fn outbound_headers(&self, inbound: &HeaderMap, credentials: &Credentials) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

        let forwarded: Vec<(&HeaderName, &HeaderValue)> = inbound
            .iter()
            .filter(|(name, _)| {
                !STRIPPED_HEADERS.contains(*name)
                    && **name != self.tenant_header
                    && **name != self.token_header
            })
            .collect();
        for (name, _) in &forwarded {
            headers.remove(*name);
        }
        for (name, value) in forwarded {
            headers.append(name.clone(), value.clone());
        }

        if let Ok(tenant) = HeaderValue::from_str(&credentials.tenant) {
            headers.insert(self.tenant_header.clone(), tenant);
        }
        if !credentials.token.is_empty() {
            if let Ok(token) = HeaderValue::from_str(&credentials.token) {
                headers.insert(self.token_header.clone(), token);
            }
        }
        headers
    }
}

fn is_supported(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::POST | Method::PUT)
}

fn is_blank(payload: &[u8]) -> bool {
    payload.iter().all(u8::is_ascii_whitespace)
}
