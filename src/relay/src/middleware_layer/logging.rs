//! Logging middleware for request/response tracking

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Request logging middleware that tracks all HTTP requests.
///
/// Bodies are never logged: relay requests carry API keys.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = extract_request_id(&request);

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str())
        .unwrap_or_else(|| uri.path())
        .to_string();

    let client_ip = extract_client_ip(&request);

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
        client_ip = %client_ip,
        status = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    );

    span.in_scope(|| {
        info!(method = %method, uri = %uri, client_ip = %client_ip, "Request started");
    });

    let response = next.run(request).instrument(span.clone()).await;

    let duration = start_time.elapsed();
    let status = response.status();

    span.record("status", status.as_u16());
    span.record("duration_ms", duration.as_millis() as u64);

    let _guard = span.enter();
    match status {
        status if status.is_server_error() => {
            error!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = duration.as_millis() as u64,
                "Request completed with server error"
            );
        }
        status if status.is_client_error() => {
            warn!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = duration.as_millis() as u64,
                "Request completed with client error"
            );
        }
        _ => {
            info!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = duration.as_millis() as u64,
                "Request completed successfully"
            );
        }
    }

    response
}

/// Request id set by the request-id layer, or a fresh one
fn extract_request_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Extract client IP from request headers
fn extract_client_ip(request: &Request<Body>) -> String {
    // First hop of a proxy chain
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_client_ip() {
        let mut request: Request<Body> =
            Request::builder().uri("/api/proxy").body(Body::empty()).unwrap();
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&request), "192.168.1.1");

        let mut request: Request<Body> =
            Request::builder().uri("/api/proxy").body(Body::empty()).unwrap();
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        assert_eq!(extract_client_ip(&request), "10.0.0.1");

        let request: Request<Body> =
            Request::builder().uri("/api/proxy").body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request), "unknown");
    }

    #[test]
    fn test_request_id_prefers_header() {
        let mut request: Request<Body> =
            Request::builder().uri("/health").body(Body::empty()).unwrap();
        request
            .headers_mut()
            .insert("x-request-id", HeaderValue::from_static("req-123"));
        assert_eq!(extract_request_id(&request), "req-123");

        let request: Request<Body> = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert!(Uuid::parse_str(&extract_request_id(&request)).is_ok());
    }
}
