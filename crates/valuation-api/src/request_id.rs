use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Span field the request id is recorded under.
pub const REQUEST_ID_FIELD: &str = "request_id";

/// Incoming `X-Request-Id` if usable, otherwise a fresh UUID v4.
pub fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Record the request id on the enclosing `http_request` span and echo it
/// on the response.
pub async fn request_id_middleware(headers: HeaderMap, request: Request, next: Next) -> Response {
    let id = resolve_request_id(&headers);
    tracing::Span::current().record(REQUEST_ID_FIELD, id.as_str());

    let mut response = next.run(request).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-7"));
        assert_eq!(resolve_request_id(&headers), "req-7");

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(""));
        let generated = resolve_request_id(&headers);
        assert!(Uuid::parse_str(&generated).is_ok());

        let oversized = "a".repeat(129);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&oversized).unwrap());
        assert_ne!(resolve_request_id(&headers), oversized);

        assert_ne!(resolve_request_id(&HeaderMap::new()), resolve_request_id(&HeaderMap::new()));
    }
}
