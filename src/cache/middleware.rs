//! Response cache middleware for the index page.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, Limited};
use tracing::{debug, instrument, warn};

use super::{
    keys::{INDEX_PAGE_PREFIX, ResponseKey, ViewerScope},
    store::{CachedResponse, ResponseCache},
};
use crate::application::accounts::Viewer;

const MAX_CACHED_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Serves `GET` requests from the cache and stores fresh 200 responses.
///
/// Must run inside the layer that resolves the [`Viewer`]; requests without one are
/// treated as anonymous.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn index_cache_layer(
    State(cache): State<Arc<ResponseCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    let scope = ViewerScope::from_user_id(
        request
            .extensions()
            .get::<Viewer>()
            .and_then(Viewer::id),
    );
    let key = ResponseKey::new(
        INDEX_PAGE_PREFIX,
        scope,
        request.uri().path(),
        request.uri().query(),
    );

    if let Some(cached) = cache.get(&key) {
        debug!(cache = "index", outcome = "hit", key = %key, "serving cached response");
        return cached.into_response();
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || response.headers().contains_key(header::SET_COOKIE)
    {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match Limited::new(body, MAX_CACHED_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to buffer response for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    debug!(cache = "index", outcome = "store", key = %key, "caching response");
    cache.insert(
        key,
        CachedResponse {
            status: parts.status,
            headers: parts.headers.clone(),
            body: bytes.clone(),
        },
    );

    Response::from_parts(parts, Body::from(bytes))
}
