//! Request ID middleware.
//!
//! Every request runs inside a `request` span carrying its `x-request-id`,
//! taken from the client when usable, so the move and room fault lines
//! logged by handlers can be matched to the HTTP call that caused them.
//! The id is echoed on the response.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied id that is kept as is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// The client's request id, or a fresh UUID when it sent none or one that
/// is unprintable or too long.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string)
}

pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let id = request_id(request.headers());
    let span = tracing::info_span!(
        "request",
        request_id = %id,
        method = %request.method(),
        uri = %request.uri(),
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    span.in_scope(|| tracing::debug!(status = %response.status(), "Request completed"));
    response
}
