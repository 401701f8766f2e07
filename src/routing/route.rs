//! Compiled route descriptors.

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::config::schema::RouteConfig;

/// Why a route entry was rejected while compiling the route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route #{index}: dialect (type) is empty")]
    EmptyDialect { index: usize },

    #[error("route #{index}: invalid HTTP method '{method}'")]
    InvalidMethod { index: usize, method: String },

    #[error("route #{index}: path pattern '{pattern}' {reason}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        reason: &'static str,
    },

    #[error("route #{index}: proxy path '{path}' must start with '/'")]
    InvalidProxyPath { index: usize, path: String },

    #[error("route #{index}: invalid expected status {status}")]
    InvalidExpectedStatus { index: usize, status: u16 },
}

/// One declared inbound endpoint variant for one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    dialect: String,
    method: Method,
    path_pattern: String,
    backend_path: String,
    backend_method: Option<Method>,
    extra_query: Option<String>,
    expected_status: Option<StatusCode>,
}

impl RouteDescriptor {
    /// Build a descriptor directly; `backend_method` overrides the inbound verb.
    pub fn new(
        dialect: impl Into<String>,
        method: Method,
        path_pattern: impl Into<String>,
        backend_path: impl Into<String>,
    ) -> Self {
        Self {
            dialect: dialect.into(),
            method,
            path_pattern: path_pattern.into(),
            backend_path: backend_path.into(),
            backend_method: None,
            extra_query: None,
            expected_status: None,
        }
    }

    pub fn with_backend_method(mut self, method: Method) -> Self {
        self.backend_method = Some(method);
        self
    }

    pub fn with_extra_query(mut self, extra_query: impl Into<String>) -> Self {
        self.extra_query = Some(extra_query.into());
        self
    }

    pub fn with_expected_status(mut self, status: StatusCode) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Compile a raw configuration entry. `index` is only used in error messages.
    pub fn compile(index: usize, raw: &RouteConfig) -> Result<Self, RouteError> {
        if raw.dialect.is_empty() {
            return Err(RouteError::EmptyDialect { index });
        }
        let method = parse_method(index, &raw.method)?;
        let backend_method = raw
            .proxy_method
            .as_deref()
            .map(|m| parse_method(index, m))
            .transpose()?;

        validate_pattern(index, &raw.path_pattern)?;
        if !raw.proxy_path.starts_with('/') {
            return Err(RouteError::InvalidProxyPath {
                index,
                path: raw.proxy_path.clone(),
            });
        }

        let expected_status = raw
            .expected_status
            .map(|status| {
                StatusCode::from_u16(status)
                    .map_err(|_| RouteError::InvalidExpectedStatus { index, status })
            })
            .transpose()?;

        Ok(Self {
            dialect: raw.dialect.clone(),
            method,
            path_pattern: raw.path_pattern.clone(),
            backend_path: raw.proxy_path.clone(),
            backend_method,
            extra_query: raw.extra_query.clone().filter(|q| !q.is_empty()),
            expected_status,
        })
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Method the gateway accepts on this route.
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    /// Backend path template, possibly containing `:name` placeholders.
    pub fn backend_path(&self) -> &str {
        &self.backend_path
    }

    /// Verb used for the backend call.
    pub fn backend_method(&self) -> &Method {
        self.backend_method.as_ref().unwrap_or(&self.method)
    }

    /// Fixed query fragment AND-ed into the caller's `query`, or "".
    pub fn extra_query(&self) -> &str {
        self.extra_query.as_deref().unwrap_or_default()
    }

    /// The single status an update is allowed to answer with.
    ///
    /// PUT routes expect `204 No Content` unless configured otherwise; other
    /// verbs accept any response.
    pub fn expected_status(&self) -> Option<StatusCode> {
        self.expected_status.or_else(|| {
            (self.backend_method() == Method::PUT).then_some(StatusCode::NO_CONTENT)
        })
    }
}

fn parse_method(index: usize, method: &str) -> Result<Method, RouteError> {
    Method::from_bytes(method.as_bytes()).map_err(|_| RouteError::InvalidMethod {
        index,
        method: method.to_string(),
    })
}

fn validate_pattern(index: usize, pattern: &str) -> Result<(), RouteError> {
    let reason = if !pattern.starts_with('/') {
        Some("must start with '/'")
    } else if pattern.contains(['{', '}', '*']) {
        Some("must not contain '{', '}' or '*'")
    } else if pattern.split('/').any(|segment| segment == ":") {
        Some("has an unnamed ':' segment")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RouteError::InvalidPattern {
            index,
            pattern: pattern.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Translate `:name` segments into the `{name}` capture syntax of the HTTP router.
pub fn to_router_path(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
