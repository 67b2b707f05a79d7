//! Signup, login and logout.

use axum::{
    Extension, Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    application::{
        accounts::{AccountError, SignupDraft, Viewer},
        error::HttpError,
    },
    domain::forms::FieldErrors,
    presentation::views::{
        FormErrorsView, LayoutView, LoggedOutTemplate, LoginTemplate, SignupTemplate,
        render_template_response,
    },
};

use super::{
    HttpState, see_other,
    session::{SESSION_COOKIE, removal_cookie, safe_next, session_cookie},
};

const INVALID_LOGIN_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    username: String,
    full_name: String,
    password1: String,
    password2: String,
}

pub(super) async fn login_form(
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<NextQuery>,
) -> Response {
    render_login(&viewer, String::new(), query.next, None)
}

pub(super) async fn login(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.login(&form.username, &form.password).await {
        Ok(session) => {
            info!(user_id = session.user.id, "user logged in");
            let target = safe_next(form.next.as_deref()).unwrap_or("/").to_string();
            let jar = jar.add(session_cookie(&session, state.cookies));
            (jar, see_other(&target)).into_response()
        }
        Err(AccountError::InvalidCredentials) => render_login(
            &viewer,
            form.username,
            form.next,
            Some(INVALID_LOGIN_MESSAGE.to_string()),
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn signup_form(Extension(viewer): Extension<Viewer>) -> Response {
    render_signup(&viewer, String::new(), String::new(), FieldErrors::new())
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let draft = SignupDraft {
        username: form.username.clone(),
        full_name: form.full_name.clone(),
        password: form.password1,
        password_confirm: form.password2,
    };

    match state.accounts.signup(draft).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&session, state.cookies));
            (jar, see_other("/")).into_response()
        }
        Err(AccountError::Invalid(errors)) => {
            render_signup(&viewer, form.username, form.full_name, errors)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Revokes the session and always clears the cookie.
pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        warn!(error = %err, "failed to revoke session on logout");
    }

    let jar = jar.remove(removal_cookie());
    let page = render_template_response(
        LoggedOutTemplate {
            layout: LayoutView::anonymous("Logged out"),
        },
        StatusCode::OK,
    );
    (jar, page).into_response()
}

fn render_login(
    viewer: &Viewer,
    username: String,
    next: Option<String>,
    error: Option<String>,
) -> Response {
    render_template_response(
        LoginTemplate {
            layout: LayoutView::new("Log in", viewer.user()),
            username,
            next: safe_next(next.as_deref()).unwrap_or_default().to_string(),
            error,
        },
        StatusCode::OK,
    )
}

fn render_signup(
    viewer: &Viewer,
    username: String,
    full_name: String,
    errors: FieldErrors,
) -> Response {
    render_template_response(
        SignupTemplate {
            layout: LayoutView::new("Sign up", viewer.user()),
            username,
            full_name,
            errors: FormErrorsView(errors),
        },
        StatusCode::OK,
    )
}
