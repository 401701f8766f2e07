//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Request, StatusCode},
    response::Response,
    Router,
};
use procurement_gateway::config::schema::ApiKeyConfig;
use procurement_gateway::routing::load_route_table;
use procurement_gateway::{GatewayConfig, GatewayServer, Shutdown};
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-api-key";
pub const TENANT: &str = "diku";
pub const TOKEN: &str = "test-token";

/// What the mock backend answers: status, content type, body.
pub type Reply = (u16, Option<&'static str>, String);

/// One request as the mock backend received it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    /// Path and query.
    pub uri: String,
    pub headers: HeaderMap,
    pub body: String,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockBackend {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> SeenRequest {
        self.requests().pop().expect("backend received no request")
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F>(f: F) -> MockBackend
where
    F: Fn(&SeenRequest) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = seen.clone();
    let app = Router::new().fallback(move |request: Request<Body>| {
        let f = f.clone();
        let recorded = recorded.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            let seen = SeenRequest {
                method: parts.method.to_string(),
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body: String::from_utf8_lossy(&body).into_owned(),
            };
            let (status, content_type, body) = f(&seen);
            recorded.lock().unwrap().push(seen);

            let mut response = Response::new(Body::from(body));
            *response.status_mut() = StatusCode::from_u16(status).unwrap();
            if let Some(ct) = content_type {
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            }
            response
        }
    });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend { addr, seen }
}

/// Start a mock backend that always answers the same way.
pub async fn start_mock_backend(status: u16, content_type: Option<&'static str>, body: &'static str) -> MockBackend {
    start_programmable_backend(move |_| (status, content_type, body.to_string())).await
}

/// Gateway configuration pointing at `backend`, with one accepted API key.
pub fn gateway_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.base_url = format!("http://{}", backend);
    config.backend.request_timeout_ms = 2_000;
    config.auth.api_keys.push(ApiKeyConfig {
        key: API_KEY.into(),
        tenant: TENANT.into(),
        token: TOKEN.into(),
    });
    config
}

pub struct RunningGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl RunningGateway {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

/// Start the gateway in-process with the route table `config` points at.
pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let routes = load_route_table(config.routing.api_config.as_deref())
        .await
        .unwrap();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = GatewayServer::from_config(config, routes).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningGateway { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
