//! Outbound response shaping.
//!
//! # Responsibilities
//! - Turn the result of a backend call into the caller's response
//! - Count backend failures by kind
//!
//! # Design Decisions
//! - An unexpected non-2xx answer is still the backend's own error and is
//!   transcoded like any other; an unexpected 2xx becomes an internal error
//! - Timeouts answer `408`, transport failures `500`

use crate::backend::client::{BackendResponse, ForwardError};
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::transcode::{render, render_error, Rendered};

/// Build the caller's response for one forwarded request.
pub fn respond(accept: Option<&str>, outcome: Result<BackendResponse, ForwardError>) -> Rendered {
    match outcome {
        Ok(response) => transcode(accept, response),
        Err(ForwardError::UnexpectedStatus { expected, response })
            if !response.status.is_success() =>
        {
            tracing::warn!(
                expected = expected.as_u16(),
                status = response.status.as_u16(),
                "Backend rejected update"
            );
            transcode(accept, response)
        }
        Err(err) => {
            let err = GatewayError::from(err);
            metrics::record_backend_failure(err.kind());
            tracing::error!(error = %err, kind = err.kind(), "Backend call failed");
            render_error(accept, &err)
        }
    }
}

fn transcode(accept: Option<&str>, response: BackendResponse) -> Rendered {
    render(
        accept,
        response.status,
        response.content_type.as_deref(),
        response.body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::Envelope;
    use axum::http::StatusCode;
    use std::time::Duration;

    fn text(rendered: &Rendered) -> &str {
        std::str::from_utf8(&rendered.body).unwrap()
    }

    #[test]
    fn test_success_is_passed_through() {
        let rendered = respond(
            None,
            Ok(BackendResponse::new(StatusCode::OK, Some("application/json"), "{}")),
        );
        assert_eq!(rendered.status, StatusCode::OK);
        assert_eq!(text(&rendered), "{}");
    }

    #[test]
    fn test_rejected_update_is_transcoded() {
        let response = BackendResponse::new(StatusCode::NOT_FOUND, Some("text/plain"), "no such line");
        let rendered = respond(
            Some("application/json"),
            Err(ForwardError::UnexpectedStatus {
                expected: StatusCode::NO_CONTENT,
                response,
            }),
        );
        assert_eq!(rendered.status, StatusCode::NOT_FOUND);
        assert_eq!(
            Envelope::from_json(text(&rendered)).unwrap(),
            Envelope::error("NOT_FOUND", "no such line")
        );
    }

    #[test]
    fn test_unexpected_success_is_internal_error() {
        let response = BackendResponse::new(StatusCode::OK, Some("application/json"), "{}");
        let rendered = respond(
            Some("application/json"),
            Err(ForwardError::UnexpectedStatus {
                expected: StatusCode::NO_CONTENT,
                response,
            }),
        );
        assert_eq!(rendered.status, StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = Envelope::from_json(text(&rendered)).unwrap();
        let error = envelope.error.unwrap();
        assert_eq!(error.code, "INTERNAL_SERVER_ERROR");
        assert!(error.message.contains("200"));
        assert!(error.message.contains("204"));
    }

    #[test]
    fn test_timeout_and_transport_failures() {
        let rendered = respond(None, Err(ForwardError::Timeout(Duration::from_secs(1))));
        assert_eq!(rendered.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            Envelope::from_xml(text(&rendered)).unwrap(),
            Envelope::error("REQUEST_TIMEOUT", "Request to backend timed out")
        );

        let rendered = respond(None, Err(ForwardError::Transport("connection refused".into())));
        assert_eq!(rendered.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
