//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with one endpoint per declared path pattern
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Answer the health check without touching the backend
//! - Dispatch each request: parameters → dialect → auth → route → forward → transcode
//! - Observability (metrics, correlation IDs)
//!
//! # Design Decisions
//! - Error statuses produced by middleware or by the router itself (body
//!   limit, timeout, method mismatch) are rewritten into envelopes; responses
//!   built by a handler are marked and left alone

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header::ACCEPT, request::Parts, HeaderMap, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, MethodRouter},
    Router, ServiceExt,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{Layer, ServiceBuilder};
use tower_http::{
    limit::RequestBodyLimitLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::backend::{
    Authenticator, BackendClient, Forwarder, HyperBackendClient, Outbound, StaticKeyAuthenticator,
};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::http::request::{collect_params, request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::respond;
use crate::lifecycle::shutdown::recv_shutdown;
use crate::observability::metrics;
use crate::routing::route::to_router_path;
use crate::routing::template::{merge_extra_query, resolve_path, TemplateParam};
use crate::routing::RouteTable;
use crate::transcode::{render_error, Rendered, Transcoded};

/// Metric label used when no route was selected.
const NO_DIALECT: &str = "none";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub authenticator: Arc<dyn Authenticator>,
    pub forwarder: Forwarder,
    pub max_body_size: usize,
}

/// The gateway's inbound HTTP surface.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        routes: RouteTable,
        authenticator: Arc<dyn Authenticator>,
        backend: Arc<dyn BackendClient>,
    ) -> GatewayResult<Self> {
        let state = AppState {
            routes: Arc::new(routes),
            authenticator,
            forwarder: Forwarder::new(backend, &config.backend)?,
            max_body_size: config.security.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Server with the static key table of `config` and a pooled HTTP backend client.
    pub fn from_config(config: GatewayConfig, routes: RouteTable) -> GatewayResult<Self> {
        let authenticator = Arc::new(StaticKeyAuthenticator::new(&config.auth.api_keys));
        let backend = Arc::new(HyperBackendClient::default());
        Self::new(config, routes, authenticator, backend)
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let health_path = config.routing.health_path.as_str();

        let mut endpoints: Vec<(String, Vec<String>)> = Vec::new();
        for pattern in state.routes.patterns() {
            let path = router_path(pattern);
            if path == health_path {
                tracing::warn!(pattern = %pattern, "Route collides with the health check; skipping");
                continue;
            }
            let shape = route_shape(&path);
            match endpoints.iter_mut().find(|(p, _)| route_shape(p) == shape) {
                Some((_, patterns)) => patterns.push(pattern.to_string()),
                None => endpoints.push((path, vec![pattern.to_string()])),
            }
        }

        let mut router: Router<AppState> = Router::new();
        for (path, patterns) in endpoints {
            tracing::debug!(path = %path, patterns = ?patterns, "Registering endpoint");
            let has_captures = path.contains('{');
            router = router.route(&path, endpoint(Arc::from(patterns), has_captures));
        }

        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(middleware::from_fn_with_state(
                config.security.max_body_size,
                envelope_rejections,
            ))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        router
            .fallback(route_not_configured)
            .with_state(state)
            .merge(admin::health_router::<()>(health_path))
            .layer(layers)
    }

    /// The complete service, trailing slashes trimmed before routing.
    pub fn app(&self) -> NormalizePath<Router> {
        NormalizePathLayer::trim_trailing_slash().layer(self.router.clone())
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = ServiceExt::<Request<Body>>::into_make_service(self.app());
        axum::serve(listener, app)
            .with_graceful_shutdown(recv_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Handler for every pattern sharing one router path.
fn endpoint(patterns: Arc<[String]>, has_captures: bool) -> MethodRouter<AppState> {
    if has_captures {
        any(
            move |State(state): State<AppState>,
                  captures: Result<Path<Vec<(String, String)>>, PathRejection>,
                  request: Request<Body>| {
                let patterns = patterns.clone();
                async move {
                    match captures {
                        Ok(Path(captures)) => dispatch(state, &patterns, captures, request).await,
                        Err(rejection) => reject(
                            &request,
                            GatewayError::InvalidRequest(rejection.body_text()),
                        ),
                    }
                }
            },
        )
    } else {
        any(move |State(state): State<AppState>, request: Request<Body>| {
            let patterns = patterns.clone();
            async move { dispatch(state, &patterns, Vec::new(), request).await }
        })
    }
}

async fn dispatch(
    state: AppState,
    patterns: &[String],
    captures: Vec<(String, String)>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let accept_header = accept(&parts.headers);

    let mut dialect = None;
    let rendered = match process(&state, patterns, &captures, &parts, body, &mut dialect).await {
        Ok(rendered) => rendered,
        Err(err) => {
            tracing::warn!(error = %err, kind = err.kind(), "Request rejected");
            render_error(accept_header.as_deref(), &err)
        }
    };

    metrics::record_request(
        parts.method.as_str(),
        rendered.status.as_u16(),
        dialect.as_deref().unwrap_or(NO_DIALECT),
        start,
    );
    rendered.into_response()
}

async fn process(
    state: &AppState,
    patterns: &[String],
    captures: &[(String, String)],
    parts: &Parts,
    body: Body,
    resolved_dialect: &mut Option<String>,
) -> GatewayResult<Rendered> {
    let payload = axum::body::to_bytes(body, state.max_body_size)
        .await
        .map_err(|e| {
            let source = e.into_inner();
            if exceeds_limit(&*source) {
                GatewayError::PayloadTooLarge {
                    limit: state.max_body_size,
                }
            } else {
                GatewayError::Internal(format!("Failed to read request body: {source}"))
            }
        })?;

    let method = &parts.method;
    let query = parts.uri.query();
    let params = collect_params(query, &[], &parts.headers, &payload);
    let dialect = params.get(TemplateParam::Type.name()).unwrap_or_default();

    let pattern = select_pattern(&state.routes, patterns, method, dialect)
        .filter(|pattern| state.routes.declares(method, pattern))
        .ok_or_else(|| GatewayError::RouteNotConfigured {
            method: method.to_string(),
            path: parts.uri.path().to_string(),
        })?;

    if dialect.is_empty() {
        return Err(GatewayError::MissingParameter(TemplateParam::Type.name().to_string()));
    }
    let credentials = state.authenticator.authenticate(&parts.headers, &params)?;
    let route = state.routes.resolve(dialect, method, pattern)?;
    *resolved_dialect = Some(route.dialect().to_string());

    let mut params = collect_params(
        query,
        &name_captures(pattern, captures),
        &parts.headers,
        &payload,
    );
    merge_extra_query(route.backend_path(), route.extra_query(), &mut params);
    let backend_path = resolve_path(route.backend_path(), Some(&params));

    tracing::info!(
        dialect = %route.dialect(),
        pattern = %pattern,
        tenant = %credentials.tenant,
        backend_method = %route.backend_method(),
        backend_path = %backend_path,
        "Dispatching request"
    );

    let outcome = state
        .forwarder
        .forward(Outbound {
            method: route.backend_method(),
            path: &backend_path,
            payload,
            headers: &parts.headers,
            credentials: &credentials,
            expected_status: route.expected_status(),
        })
        .await;

    Ok(respond(accept(&parts.headers).as_deref(), outcome))
}

/// Among patterns sharing a router path, the one this request addresses.
fn select_pattern<'a>(
    routes: &RouteTable,
    patterns: &'a [String],
    method: &Method,
    dialect: &str,
) -> Option<&'a str> {
    patterns
        .iter()
        .find(|pattern| routes.resolve(dialect, method, pattern).is_ok())
        .or_else(|| patterns.iter().find(|pattern| routes.declares(method, pattern)))
        .or_else(|| patterns.first())
        .map(String::as_str)
}

/// Give positional captures the names `pattern` declares for them.
fn name_captures(pattern: &str, captures: &[(String, String)]) -> Vec<(String, String)> {
    pattern
        .split('/')
        .filter_map(|segment| segment.strip_prefix(':'))
        .zip(captures)
        .map(|(name, (_, value))| (name.to_string(), value.clone()))
        .collect()
}

async fn route_not_configured(request: Request<Body>) -> Response {
    let err = GatewayError::RouteNotConfigured {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
    };
    reject(&request, err)
}

/// Answer a request refused before dispatch.
fn reject(request: &Request<Body>, err: GatewayError) -> Response {
    let start = Instant::now();
    tracing::warn!(error = %err, kind = err.kind(), "Request rejected");

    let rendered = render_error(accept(request.headers()).as_deref(), &err);
    metrics::record_request(
        request.method().as_str(),
        rendered.status.as_u16(),
        NO_DIALECT,
        start,
    );
    rendered.into_response()
}

/// Give error responses that no handler rendered an envelope.
async fn envelope_rejections(
    State(max_body_size): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let accept_header = accept(request.headers());
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if response.extensions().get::<Transcoded>().is_some()
        || !(status.is_client_error() || status.is_server_error())
    {
        return response;
    }

    let err = match status {
        StatusCode::PAYLOAD_TOO_LARGE => GatewayError::PayloadTooLarge {
            limit: max_body_size,
        },
        StatusCode::METHOD_NOT_ALLOWED => GatewayError::MethodNotAllowed { method, path },
        StatusCode::REQUEST_TIMEOUT => GatewayError::RequestTimeout,
        other => GatewayError::Rejected(other),
    };
    tracing::warn!(error = %err, kind = err.kind(), "Request rejected by middleware");
    render_error(accept_header.as_deref(), &err).into_response()
}

/// Whether a body read failed on the size limit.
fn exceeds_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

fn accept(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn router_path(pattern: &str) -> String {
    match pattern.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => to_router_path(trimmed),
    }
}

/// Router path with capture names erased; paths with equal shapes conflict.
fn route_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| if segment.starts_with('{') { "{}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::client::{BackendRequest, BackendResponse, ForwardError};
    use crate::config::schema::ApiKeyConfig;
    use crate::routing::RouteDescriptor;
    use crate::transcode::Envelope;
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;
    use tower::ServiceExt as _;

    /// Records every call and answers with a fixed response.
    struct RecordingBackend {
        response: BackendResponse,
        seen: Mutex<Vec<BackendRequest>>,
    }

    impl RecordingBackend {
        fn new(status: StatusCode, content_type: Option<&str>, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                response: BackendResponse::new(status, content_type, body),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn urls(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.url.to_string())
                .collect()
        }
    }

    impl BackendClient for RecordingBackend {
        fn call(&self, request: BackendRequest) -> BoxFuture<'_, Result<BackendResponse, ForwardError>> {
            self.seen.lock().unwrap().push(request);
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    /// Never answers.
    struct StalledBackend;

    impl BackendClient for StalledBackend {
        fn call(&self, _request: BackendRequest) -> BoxFuture<'_, Result<BackendResponse, ForwardError>> {
            Box::pin(futures_util::future::pending::<Result<BackendResponse, ForwardError>>())
        }
    }

    fn server(backend: Arc<RecordingBackend>) -> GatewayServer {
        build(backend, GatewayConfig::default())
    }

    fn build(backend: Arc<dyn BackendClient>, mut config: GatewayConfig) -> GatewayServer {
        config.backend.base_url = "http://backend:9130".into();
        config.auth.api_keys.push(ApiKeyConfig {
            key: "key".into(),
            tenant: "diku".into(),
            token: "tok".into(),
        });
        let routes = RouteTable::new(vec![
            RouteDescriptor::new(
                "COMMON",
                Method::GET,
                "/orders/funds",
                "/finance/funds?offset=:offset&limit=:limit&query=:query",
            ),
            RouteDescriptor::new("EBSCONET", Method::GET, "/orders/lines/:id", "/ebsconet/lines/:id"),
            RouteDescriptor::new("GOBI", Method::GET, "/orders/lines/:lineId", "/gobi/lines/:lineId"),
            RouteDescriptor::new("GOBI", Method::GET, "/admin/health", "/never"),
        ]);
        let authenticator = Arc::new(StaticKeyAuthenticator::new(&config.auth.api_keys));
        GatewayServer::new(config, routes, authenticator, backend).unwrap()
    }

    async fn get(server: &GatewayServer, uri: &str) -> (StatusCode, String) {
        let response = server
            .app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_bypasses_routing() {
        let backend = RecordingBackend::new(StatusCode::OK, None, "");
        let server = server(backend.clone());

        let response = server
            .app()
            .oneshot(Request::get("/admin/health/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert!(backend.urls().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_fill_backend_query() {
        let backend = RecordingBackend::new(StatusCode::OK, Some("application/json"), "{}");
        let server = server(backend.clone());

        let (status, body) = get(&server, "/orders/funds?type=COMMON&apiKey=key").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{}");
        assert_eq!(
            backend.urls(),
            vec!["http://backend:9130/finance/funds?offset=0&limit=20"]
        );
    }

    #[tokio::test]
    async fn test_patterns_sharing_a_shape_keep_their_names() {
        let backend = RecordingBackend::new(StatusCode::OK, Some("application/json"), "{}");
        let server = server(backend.clone());

        get(&server, "/orders/lines/42?type=EBSCONET&apiKey=key").await;
        get(&server, "/orders/lines/43?type=gobi&apiKey=key").await;
        assert_eq!(
            backend.urls(),
            vec![
                "http://backend:9130/ebsconet/lines/42",
                "http://backend:9130/gobi/lines/43"
            ]
        );
    }

    #[tokio::test]
    async fn test_checks_run_in_order() {
        let backend = RecordingBackend::new(StatusCode::OK, None, "");
        let server = server(backend.clone());

        let (status, body) = get(&server, "/orders/funds?apiKey=nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            Envelope::from_xml(&body).unwrap(),
            Envelope::error("BAD_REQUEST", "Missing required parameter: type")
        );

        let (status, body) = get(&server, "/orders/funds?type=COMMON&apiKey=nope").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            Envelope::from_xml(&body).unwrap(),
            Envelope::error("ACCESS_DENIED", "Access Denied")
        );

        let (status, body) = get(&server, "/orders/funds?type=AMAZON&apiKey=key").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            Envelope::from_xml(&body).unwrap(),
            Envelope::error("BAD_REQUEST", "Unknown Purchasing System Specified: AMAZON")
        );
        assert!(backend.urls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_and_method_are_not_found() {
        let server = server(RecordingBackend::new(StatusCode::OK, None, ""));

        let (status, body) = get(&server, "/nowhere?type=GOBI").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(Envelope::from_xml(&body).unwrap().error.unwrap().code, "NOT_FOUND");

        let response = server
            .app()
            .oneshot(
                Request::delete("/orders/funds?type=COMMON")
                    .header(ACCEPT, "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    async fn envelope_of(response: Response) -> (StatusCode, Envelope) {
        let status = response.status();
        let json = response.headers()[CONTENT_TYPE] == "application/json";
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let envelope = if json {
            Envelope::from_json(&text).unwrap()
        } else {
            Envelope::from_xml(&text).unwrap()
        };
        (status, envelope)
    }

    #[tokio::test]
    async fn test_undecodable_capture_is_bad_request() {
        let backend = RecordingBackend::new(StatusCode::OK, None, "");
        let server = server(backend.clone());

        let response = server
            .app()
            .oneshot(
                Request::get("/orders/lines/%FF?type=GOBI&apiKey=key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let (status, envelope) = envelope_of(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = envelope.error.unwrap();
        assert_eq!(error.code, "BAD_REQUEST");
        assert!(error.message.contains("UTF-8"));
        assert!(backend.urls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_bodies_are_enveloped() {
        let mut config = GatewayConfig::default();
        config.security.max_body_size = 64;
        let backend = RecordingBackend::new(StatusCode::OK, None, "");
        let server = build(backend.clone(), config);
        let expected = Envelope::error("INTERNAL_SERVER_ERROR", "Request body exceeds 64 bytes");

        let declared = Request::post("/orders/funds?type=COMMON&apiKey=key")
            .header(ACCEPT, "application/json")
            .header(axum::http::header::CONTENT_LENGTH, "100")
            .body(Body::from(vec![b'a'; 100]))
            .unwrap();
        let (status, envelope) = envelope_of(server.app().oneshot(declared).await.unwrap()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(envelope, expected);

        let streamed = Request::post("/orders/funds?type=COMMON&apiKey=key")
            .body(Body::from(vec![b'a'; 100]))
            .unwrap();
        let (status, envelope) = envelope_of(server.app().oneshot(streamed).await.unwrap()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(envelope, expected);
        assert!(backend.urls().is_empty());
    }

    #[tokio::test]
    async fn test_method_mismatch_on_health_is_enveloped() {
        let server = server(RecordingBackend::new(StatusCode::OK, None, ""));

        let response = server
            .app()
            .oneshot(Request::post("/admin/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (status, envelope) = envelope_of(response).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            envelope,
            Envelope::error("INTERNAL_SERVER_ERROR", "Method POST not allowed for /admin/health")
        );
    }

    #[tokio::test]
    async fn test_inbound_timeout_is_enveloped() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 1;
        let server = build(Arc::new(StalledBackend), config);

        let response = server
            .app()
            .oneshot(
                Request::get("/orders/funds?type=COMMON&apiKey=key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let (status, envelope) = envelope_of(response).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(envelope, Envelope::error("REQUEST_TIMEOUT", "Request timed out"));
    }

    #[test]
    fn test_route_shapes() {
        assert_eq!(router_path("/orders/:id/"), "/orders/{id}");
        assert_eq!(router_path("/"), "/");
        assert_eq!(route_shape("/orders/{id}"), route_shape("/orders/{lineId}"));
        assert_ne!(route_shape("/orders/{id}"), route_shape("/orders/validate"));
    }

    #[test]
    fn test_name_captures() {
        let captures = vec![("id".to_string(), "42".to_string())];
        assert_eq!(
            name_captures("/orders/lines/:lineId", &captures),
            vec![("lineId".to_string(), "42".to_string())]
        );
    }
}
