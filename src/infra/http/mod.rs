mod auth;
mod follow;
mod middleware;
mod posts;
mod public;
mod session;

pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use session::SESSION_COOKIE;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode, header::LOCATION},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    accounts::AccountService,
    error::ErrorReport,
    feed::FeedService,
    follow::FollowService,
    posts::PostService,
    repos::{RepoError, StoreHealth},
};
use crate::cache::{ResponseCache, index_cache_layer};
use crate::infra::uploads::UploadStorage;

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub health: Arc<dyn StoreHealth>,
    pub uploads: Arc<UploadStorage>,
    pub cache: Arc<ResponseCache>,
    pub cookies: CookieSettings,
    pub upload_limit_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub ttl: time::Duration,
}

pub fn build_router(state: HttpState) -> Router {
    let index = get(public::index).layer(from_fn_with_state(
        state.cache.clone(),
        index_cache_layer,
    ));

    let public_routes = Router::new()
        .route("/", index)
        .route("/group/{slug}/", get(public::group_posts))
        .route("/profile/{username}/", get(public::profile))
        .route("/posts/{id}/", get(public::post_detail))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/about/author/", get(public::about_author))
        .route("/about/tech/", get(public::about_tech))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::db_health));

    let gated_routes = Router::new()
        .route("/create/", get(posts::create_form).post(posts::create))
        .route("/posts/{id}/edit/", get(posts::edit_form).post(posts::edit))
        .route("/posts/{id}/delete/", post(posts::delete))
        .route("/posts/{id}/comment/", post(posts::add_comment))
        .route("/follow/", get(follow::follow_index))
        .route("/profile/{username}/follow/", post(follow::follow))
        .route("/profile/{username}/unfollow/", post(follow::unfollow))
        .route_layer(from_fn(session::require_login))
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes));

    public_routes
        .merge(gated_routes)
        .fallback(public::fallback)
        .layer(from_fn_with_state(state.clone(), session::attach_viewer))
        .with_state(state)
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// 303 See Other, the redirect every form submission answers with.
fn see_other(location: &str) -> Response {
    redirect_with(StatusCode::SEE_OTHER, location)
}

fn redirect_with(status: StatusCode, location: &str) -> Response {
    let mut response = status.into_response();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(_) => {
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            ErrorReport::from_message(
                "infra::http::redirect_with",
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("unencodable redirect target `{location}`"),
            )
            .attach(&mut response);
        }
    }
    response
}

/// Numeric path ids; anything else is a missing page rather than a bad request.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}
