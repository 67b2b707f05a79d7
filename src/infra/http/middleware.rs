use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use metrics::histogram;
use tracing::Level;
use uuid::Uuid;

use crate::application::{accounts::Viewer, error::ErrorReport};
use crate::infra::telemetry::HTTP_REQUEST_DURATION_MS;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 64;

/// Correlation id for one request, echoed back in `x-request-id`.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    /// Reuses a well-formed upstream id, otherwise mints a UUID.
    fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| is_acceptable_request_id(value))
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self { request_id }
    }
}

fn is_acceptable_request_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers());
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Records request latency and logs every 4xx/5xx with its [`ErrorReport`].
///
/// Runs outside the viewer layer, so the user id is read back from the response.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed();

    histogram!(
        HTTP_REQUEST_DURATION_MS,
        "method" => method.to_string(),
        "status" => status.as_u16().to_string(),
    )
    .record(elapsed.as_secs_f64() * 1000.0);

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let user_id = response
        .extensions()
        .get::<Viewer>()
        .and_then(Viewer::id)
        .map(|id| id.to_string())
        .unwrap_or_default();
    let (source, chain) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = chain
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    macro_rules! log_failure {
        ($level:expr, $message:literal) => {
            tracing::event!(
                target: "scribbly::http::response",
                $level,
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed.as_millis() as u64,
                source,
                detail,
                chain = ?chain,
                request_id = %request_id,
                user_id = %user_id,
                $message,
            )
        };
    }

    if status.is_server_error() {
        log_failure!(Level::ERROR, "request failed");
    } else {
        log_failure!(Level::WARN, "client request error");
    }

    response
}
