//! Request logging and metrics

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::metrics::record_request;

/// Logs and counts every request.
///
/// The remote address is only known when the router is served with
/// connect info; it is logged as `-` otherwise.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    let status = response.status();
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = elapsed.as_millis() as u64,
        remote = %remote,
        "Request handled"
    );
    record_request(method.as_str(), status.as_u16(), elapsed);

    response
}
