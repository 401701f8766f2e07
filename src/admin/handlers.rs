use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

/// Liveness check. Never touches the route table or the backend.
pub async fn get_health() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain")], "OK")
}
