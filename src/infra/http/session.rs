//! Cookie sessions: resolving the viewer and gating routes on login.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::warn;
use url::{Url, form_urlencoded};

use crate::application::accounts::{CurrentUser, IssuedSession, Viewer};

use super::{CookieSettings, HttpState, see_other};

pub const SESSION_COOKIE: &str = "scribbly_session";

pub const LOGIN_PATH: &str = "/auth/login/";

/// Stand-in origin for resolving redirect targets.
const SITE_ORIGIN: &str = "http://scribbly.invalid/";

/// Resolves the session cookie into a [`Viewer`] for every request.
///
/// A failing session store degrades to an anonymous viewer.
pub async fn attach_viewer(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let user = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match state.accounts.authenticate(cookie.value()).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "session lookup failed; treating viewer as anonymous");
                None
            }
        },
        None => None,
    };

    let viewer = Viewer(user);
    request.extensions_mut().insert(viewer.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(viewer);
    response
}

/// Lets signed-in viewers through as [`CurrentUser`]; everyone else goes to the login form.
pub async fn require_login(mut request: Request<Body>, next: Next) -> Response {
    let user = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.user().cloned());

    match user {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        None => {
            let target = request
                .uri()
                .path_and_query()
                .map(|value| value.as_str())
                .unwrap_or("/");
            see_other(&login_redirect(target))
        }
    }
}

pub fn login_redirect(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))
}

/// Only same-site absolute paths are followed after login.
///
/// Browsers drop tabs and newlines inside URLs, so targets with control characters or
/// whitespace are refused before checking that the path resolves to this origin.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let plain = next.starts_with('/')
        && !next
            .chars()
            .any(|ch| ch.is_control() || ch.is_whitespace() || ch == '\\');
    if !plain {
        return None;
    }

    let site = Url::parse(SITE_ORIGIN).ok()?;
    let resolved = site.join(next).ok()?;
    (resolved.origin() == site.origin()).then_some(next)
}

pub fn session_cookie(session: &IssuedSession, settings: CookieSettings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure)
        .max_age(settings.ttl)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_keeps_path_readable() {
        assert_eq!(
            login_redirect("/posts/3/edit/?page=2"),
            "/auth/login/?next=/posts/3/edit/%3Fpage%3D2"
        );
        assert_eq!(login_redirect("/create/"), "/auth/login/?next=/create/");
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/follow/")), Some("/follow/"));
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("/\t/evil.example/")), None);
        assert_eq!(safe_next(Some("/\n/evil.example/")), None);
        assert_eq!(safe_next(Some("/ /evil.example/")), None);
        assert_eq!(safe_next(Some("/\u{7f}/evil.example/")), None);
        assert_eq!(safe_next(Some("  /posts/3/  ")), Some("/posts/3/"));
        assert_eq!(safe_next(Some("/posts/?page=2")), Some("/posts/?page=2"));
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }
}
