//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Gather request parameters from the query, the matched path and form bodies
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Query parameters come first, so the first value of a name wins over
//!   path captures and form fields

use axum::http::{
    header::{HeaderName, CONTENT_TYPE},
    HeaderMap, HeaderValue, Request,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::routing::params::RequestParams;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Assigns a fresh UUID v4 to requests arriving without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID set by the request-id layer, or `-`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// Merge every parameter source of one request.
pub fn collect_params(
    query: Option<&str>,
    path_params: &[(String, String)],
    headers: &HeaderMap,
    body: &[u8],
) -> RequestParams {
    let mut params = query.map(RequestParams::from_query).unwrap_or_default();

    for (name, value) in path_params {
        params.add(name.clone(), value.clone());
    }

    if is_form(headers) {
        if let Ok(form) = std::str::from_utf8(body) {
            params.extend_from_query(form);
        }
    }
    params
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_uuids() {
        let request = Request::new(());
        let mut maker = MakeRequestUuid;
        let a = maker.make_request_id(&request).unwrap();
        let b = maker.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
        assert!(Uuid::parse_str(a.header_value().to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_query_wins_over_path_and_form() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"));
        let path = [("id".to_string(), "from-path".to_string())];

        let params = collect_params(
            Some("type=GOBI&id=from-query"),
            &path,
            &headers,
            b"apiKey=secret&type=MOSAIC",
        );
        assert_eq!(params.get("type"), Some("GOBI"));
        assert_eq!(params.get("id"), Some("from-query"));
        assert_eq!(params.get("apiKey"), Some("secret"));
    }

    #[test]
    fn test_non_form_body_is_not_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        let params = collect_params(None, &[], &headers, b"type=GOBI");
        assert!(params.is_empty());
        assert_eq!(request_id(&headers), "-");
    }
}
