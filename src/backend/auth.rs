//! Caller authentication.
//!
//! # Responsibilities
//! - Find the API key on an inbound request
//! - Resolve it to the tenant and backend token the call is made for
//!
//! # Design Decisions
//! - Sits behind a trait so deployments can plug in their own key scheme
//! - A missing or blank key is `InvalidApiKey`; an unknown one is `AccessDenied`

use std::collections::HashMap;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

use crate::config::schema::ApiKeyConfig;
use crate::error::ErrorCode;
use crate::routing::params::RequestParams;

/// Query/form parameter names the API key may arrive under.
pub const API_KEY_PARAMS: [&str; 2] = ["apiKey", "apikey"];

/// Identity a request is forwarded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Invalid API Key: {0}")]
    InvalidApiKey(String),

    #[error("Access Denied")]
    AccessDenied,
}

impl AuthFailure {
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthFailure::InvalidApiKey(_) => ErrorCode::ApiKeyInvalid,
            AuthFailure::AccessDenied => ErrorCode::AccessDenied,
        }
    }
}

/// Resolves an inbound request to the credentials used for the backend call.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap, params: &RequestParams) -> Result<Credentials, AuthFailure>;
}

/// Authenticator backed by the `auth.api_keys` table of the configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyAuthenticator {
    keys: HashMap<String, Credentials>,
}

impl StaticKeyAuthenticator {
    pub fn new(api_keys: &[ApiKeyConfig]) -> Self {
        let keys = api_keys
            .iter()
            .map(|k| {
                (
                    k.key.clone(),
                    Credentials {
                        tenant: k.tenant.clone(),
                        token: k.token.clone(),
                    },
                )
            })
            .collect();
        Self { keys }
    }
}

impl Authenticator for StaticKeyAuthenticator {
    fn authenticate(&self, headers: &HeaderMap, params: &RequestParams) -> Result<Credentials, AuthFailure> {
        let key = extract_api_key(headers, params).unwrap_or_default();
        if key.trim().is_empty() {
            return Err(AuthFailure::InvalidApiKey(key));
        }
        match self.keys.get(&key) {
            Some(credentials) => Ok(credentials.clone()),
            None => {
                tracing::warn!("Rejected request with unknown API key");
                Err(AuthFailure::AccessDenied)
            }
        }
    }
}

/// The API key from the `apiKey`/`apikey` parameter, else the `Authorization` header.
pub fn extract_api_key(headers: &HeaderMap, params: &RequestParams) -> Option<String> {
    API_KEY_PARAMS
        .iter()
        .find_map(|name| params.get_non_empty(name))
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}
