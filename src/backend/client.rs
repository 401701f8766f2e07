//! Raw backend calls.
//!
//! # Responsibilities
//! - Issue one HTTP request to the backend and buffer its response
//! - Report transport problems as typed failures
//!
//! # Design Decisions
//! - `BackendClient` is object safe (boxed futures) so tests can swap in a
//!   scripted backend without a socket
//! - No policy lives here: method checks, timeouts and status expectations
//!   belong to the forwarder

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header::CONTENT_TYPE, HeaderMap, Method, Request, StatusCode, Uri};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

/// A fully prepared outbound call.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub url: Url,
    /// Tenant the call is made for.
    pub tenant: String,
    /// `None` sends no body at all.
    pub body: Option<Bytes>,
    pub headers: HeaderMap,
}

/// A buffered backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }
}

/// Why a backend call produced no usable response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Unsupported method {0}")]
    UnsupportedMethod(Method),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend transport error: {0}")]
    Transport(String),

    /// A response arrived, but not with the one status the operation allows.
    #[error("Backend answered {} but {expected} was expected", .response.status)]
    UnexpectedStatus {
        expected: StatusCode,
        response: BackendResponse,
    },
}

/// Performs a single backend call.
pub trait BackendClient: Send + Sync {
    fn call(&self, request: BackendRequest) -> BoxFuture<'_, Result<BackendResponse, ForwardError>>;
}

/// Backend client over the hyper connection pool.
#[derive(Clone)]
pub struct HyperBackendClient {
    client: Client<HttpConnector, Body>,
    max_response_size: usize,
}

impl HyperBackendClient {
    pub fn new(max_response_size: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            max_response_size,
        }
    }
}

impl Default for HyperBackendClient {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}

impl BackendClient for HyperBackendClient {
    fn call(&self, request: BackendRequest) -> BoxFuture<'_, Result<BackendResponse, ForwardError>> {
        Box::pin(async move {
            let uri: Uri = request
                .url
                .as_str()
                .parse()
                .map_err(|e: axum::http::uri::InvalidUri| ForwardError::Transport(e.to_string()))?;

            let mut builder = Request::builder().method(request.method).uri(uri);
            if let Some(headers) = builder.headers_mut() {
                headers.extend(request.headers);
            }
            let req = builder
                .body(request.body.map(Body::from).unwrap_or_else(Body::empty))
                .map_err(|e| ForwardError::Transport(e.to_string()))?;

            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| ForwardError::Transport(e.to_string()))?;

            let (parts, body) = response.into_parts();
            let body = buffer(body, self.max_response_size).await?;

            let content_type = parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            Ok(BackendResponse {
                status: parts.status,
                content_type,
                body,
            })
        })
    }
}

/// Read a whole response body, failing past `limit` bytes.
async fn buffer(body: Incoming, limit: usize) -> Result<Bytes, ForwardError> {
    axum::body::to_bytes(Body::new(body), limit)
        .await
        .map_err(|e| ForwardError::Transport(format!("failed to read backend response: {e}")))
}
