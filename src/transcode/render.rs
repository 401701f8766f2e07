//! Rendering backend answers and gateway failures for the caller.

use axum::body::{Body, Bytes};
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{ErrorCode, GatewayError};
use crate::transcode::envelope::{Envelope, EnvelopeError, XML_PROLOG};

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";

/// Served when even the fallback envelope cannot be produced.
const LAST_RESORT_XML: &str = "<Response><Error><Code>INTERNAL_SERVER_ERROR</Code>\
<Message>Failed to convert backend response to XML</Message></Error></Response>";

/// Representation an error envelope is serialized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Xml,
}

impl ResponseFormat {
    /// JSON when the caller accepts it, XML otherwise.
    pub fn negotiate(accept: Option<&str>) -> Self {
        match accept {
            Some(accept) if accept.to_ascii_lowercase().contains(APPLICATION_JSON) => Self::Json,
            _ => Self::Xml,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => APPLICATION_JSON,
            Self::Xml => APPLICATION_XML,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Xml => "XML",
        }
    }

    fn serialize(self, envelope: &Envelope) -> Result<String, EnvelopeError> {
        match self {
            Self::Json => envelope.to_json(),
            Self::Xml => envelope.to_xml(),
        }
    }
}

/// Response extension marking a response the gateway already rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoded;

/// Outbound status, content type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Rendered {
    fn passthrough(status: StatusCode, content_type: Option<&str>, body: Bytes) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body,
        }
    }

    pub fn is_envelope(&self) -> bool {
        matches!(
            self.content_type.as_deref(),
            Some(APPLICATION_JSON) | Some(APPLICATION_XML)
        ) && !self.body.is_empty()
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.extensions_mut().insert(Transcoded);
        if let Some(value) = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }
}

/// Shape a backend answer for the caller.
pub fn render(
    accept: Option<&str>,
    status: StatusCode,
    content_type: Option<&str>,
    body: Bytes,
) -> Rendered {
    if body.is_empty() || is_acknowledgement(&body) || status.is_success() {
        return Rendered::passthrough(status, content_type, body);
    }

    if let (Some(ct), Some(accept)) = (content_type, accept) {
        if ct == accept {
            return Rendered::passthrough(status, content_type, body);
        }
    }

    let message = String::from_utf8_lossy(&body);
    let envelope = Envelope::error(ErrorCode::from_status(status.as_u16()).as_str(), message);
    wrap(ResponseFormat::negotiate(accept), status, &envelope)
}

/// Render a failure detected by the gateway itself.
pub fn render_error(accept: Option<&str>, err: &GatewayError) -> Rendered {
    let envelope = Envelope::error(err.code().as_str(), err.to_string());
    wrap(ResponseFormat::negotiate(accept), err.status(), &envelope)
}

fn wrap(format: ResponseFormat, status: StatusCode, envelope: &Envelope) -> Rendered {
    match format.serialize(envelope) {
        Ok(body) => Rendered {
            status,
            content_type: Some(format.content_type().to_string()),
            body: Bytes::from(body),
        },
        Err(e) => {
            tracing::error!(error = %e, format = format.name(), "Failed to serialize error envelope");
            serialization_fallback(format)
        }
    }
}

/// XML `INTERNAL_SERVER_ERROR` envelope used when an envelope could not be serialized.
pub fn serialization_fallback(format: ResponseFormat) -> Rendered {
    let err = GatewayError::TranscodeFailure(format.name().to_string());
    let body = Envelope::error(err.code().as_str(), err.to_string())
        .to_xml()
        .unwrap_or_else(|_| format!("{XML_PROLOG}{LAST_RESORT_XML}"));
    Rendered {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        content_type: Some(APPLICATION_XML.to_string()),
        body: Bytes::from(body),
    }
}

/// `<test>METHOD - OK</test>`, as sent by validation-only backend operations.
pub fn is_acknowledgement(body: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(body) else {
        return false;
    };
    text.trim()
        .strip_prefix("<test>")
        .and_then(|rest| rest.strip_suffix("</test>"))
        .and_then(|inner| inner.strip_suffix(" - OK"))
        .is_some_and(|method| !method.is_empty() && method.bytes().all(|b| b.is_ascii_uppercase()))
}
