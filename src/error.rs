//! Error taxonomy.
//!
//! # Responsibilities
//! - Map backend HTTP status codes to the symbolic codes carried in error envelopes
//! - Classify failures detected by the gateway itself and give each one an
//!   outbound status, code and message
//!
//! # Design Decisions
//! - Status → code is a plain `match`; the code set is fixed and small
//! - The mapping is total: anything unmapped is `INTERNAL_SERVER_ERROR`
//! - Only status → code is needed, there is no reverse lookup

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::auth::AuthFailure;
use crate::backend::client::ForwardError;

/// Symbolic error code embedded in the `Error` element of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BadRequest,
    /// API-key specific 401; the message carries the offending key.
    ApiKeyInvalid,
    AccessDenied,
    Forbidden,
    NotFound,
    RequestTimeout,
    InternalServerError,
}

impl ErrorCode {
    /// Map a backend status code to its symbolic code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::AccessDenied,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            408 => Self::RequestTimeout,
            _ => Self::InternalServerError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::ApiKeyInvalid => "API_KEY_INVALID",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures the gateway detects or produces on its own.
///
/// Backend-reported errors are not represented here: they are transcoded
/// from the backend response directly.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required request parameter is missing or empty.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// No route is declared for this dialect on the requested method and path.
    #[error("Unknown Purchasing System Specified: {0}")]
    UnknownDialect(String),

    /// Neither the path nor the method is declared for any dialect.
    #[error("No route configured for {method} {path}")]
    RouteNotConfigured { method: String, path: String },

    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("Request to backend timed out")]
    Timeout,

    #[error("Unsupported method {0}")]
    UnsupportedMethod(String),

    /// The request URI could not be decoded.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    /// The inbound request outlived the server-side request timeout.
    #[error("Request timed out")]
    RequestTimeout,

    /// Any other error status produced before a handler ran.
    #[error("Request rejected with status {}", .0.as_u16())]
    Rejected(StatusCode),

    /// The error envelope could not be serialized for the caller.
    #[error("Failed to convert backend response to {0}")]
    TranscodeFailure(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Outbound HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) | Self::UnknownDialect(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::RouteNotConfigured { .. } => StatusCode::NOT_FOUND,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Timeout | Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Rejected(status) => *status,
            Self::UnsupportedMethod(_) | Self::TranscodeFailure(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Symbolic code placed in the error envelope.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Auth(failure) => failure.code(),
            other => ErrorCode::from_status(other.status().as_u16()),
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::UnknownDialect(_) => "unknown_dialect",
            Self::RouteNotConfigured { .. } => "route_not_configured",
            Self::Auth(_) => "auth_failure",
            Self::Timeout => "timeout",
            Self::UnsupportedMethod(_) => "unsupported_method",
            Self::InvalidRequest(_) => "invalid_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::RequestTimeout => "request_timeout",
            Self::Rejected(_) => "rejected",
            Self::TranscodeFailure(_) => "transcode_failure",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::UnsupportedMethod(method) => Self::UnsupportedMethod(method.to_string()),
            ForwardError::Timeout(_) => Self::Timeout,
            ForwardError::Transport(msg) => Self::Internal(msg),
            ForwardError::UnexpectedStatus { expected, response } => Self::Internal(format!(
                "Unexpected status {} from backend, expected {}",
                response.status.as_u16(),
                expected.as_u16()
            )),
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_to_code() {
        assert_eq!(ErrorCode::from_status(400), ErrorCode::BadRequest);
        assert_eq!(ErrorCode::from_status(401), ErrorCode::AccessDenied);
        assert_eq!(ErrorCode::from_status(403), ErrorCode::Forbidden);
        assert_eq!(ErrorCode::from_status(404), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_status(408), ErrorCode::RequestTimeout);
        assert_eq!(ErrorCode::from_status(500), ErrorCode::InternalServerError);
    }

    #[test]
    fn test_unmapped_status_defaults_to_internal() {
        for status in [402, 409, 422, 502, 503, 504, 999] {
            assert_eq!(ErrorCode::from_status(status), ErrorCode::InternalServerError);
        }
    }

    #[test]
    fn test_code_names() {
        assert_eq!(ErrorCode::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(ErrorCode::ApiKeyInvalid.as_str(), "API_KEY_INVALID");
    }

    #[test]
    fn test_gateway_error_classification() {
        let missing = GatewayError::MissingParameter("type".into());
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.code(), ErrorCode::BadRequest);
        assert_eq!(missing.to_string(), "Missing required parameter: type");

        let unknown = GatewayError::UnknownDialect("bogus".into());
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unknown.to_string(), "Unknown Purchasing System Specified: bogus");

        let not_configured = GatewayError::RouteNotConfigured {
            method: "GET".into(),
            path: "/nowhere".into(),
        };
        assert_eq!(not_configured.code(), ErrorCode::NotFound);

        assert_eq!(GatewayError::Timeout.code(), ErrorCode::RequestTimeout);
        assert_eq!(
            GatewayError::TranscodeFailure("application/xml".into()).code(),
            ErrorCode::InternalServerError
        );
    }

    #[test]
    fn test_auth_failure_keeps_its_own_code() {
        let err = GatewayError::from(AuthFailure::InvalidApiKey("abc".into()));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), ErrorCode::ApiKeyInvalid);
        assert_eq!(err.to_string(), "Invalid API Key: abc");

        let err = GatewayError::from(AuthFailure::AccessDenied);
        assert_eq!(err.code(), ErrorCode::AccessDenied);
    }

    #[test]
    fn test_forward_timeout_maps_to_timeout() {
        let err = GatewayError::from(ForwardError::Timeout(Duration::from_millis(10)));
        assert!(matches!(err, GatewayError::Timeout));
        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_inbound_rejections() {
        let err = GatewayError::PayloadTooLarge { limit: 16 };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.code(), ErrorCode::InternalServerError);
        assert_eq!(err.to_string(), "Request body exceeds 16 bytes");

        let err = GatewayError::InvalidRequest("Invalid URL".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), ErrorCode::BadRequest);

        assert_eq!(GatewayError::RequestTimeout.code(), ErrorCode::RequestTimeout);
        assert_eq!(
            GatewayError::Rejected(StatusCode::UNSUPPORTED_MEDIA_TYPE).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }
}
