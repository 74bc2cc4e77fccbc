//! Logging middleware

use std::time::Instant;

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

/// Request logging middleware
///
/// Polling hits the status endpoint constantly, so successful reads are
/// logged at debug; everything else at info or warn.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = format!("{:.2}", start.elapsed().as_secs_f64() * 1000.0);

    if status.is_server_error() {
        warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            "Request completed with server error"
        );
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(
            method = %method,
            path = %path,
            duration_ms = %duration_ms,
            "Request rejected, judge queue full"
        );
    } else if status.is_client_error() && status != StatusCode::NOT_FOUND {
        info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            "Request completed with client error"
        );
    } else if method == axum::http::Method::GET && path.ends_with("/status") {
        tracing::debug!(
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            "Status polled"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            "Request completed"
        );
    }

    response
}
