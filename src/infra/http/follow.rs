use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    application::{
        accounts::CurrentUser,
        error::HttpError,
        follow::{FollowError, FollowOutcome},
        pagination::PageQuery,
    },
    domain::entities::UserRecord,
    presentation::views::{
        FollowTemplate, LayoutView, post_list, render_not_found_response,
        render_template_response,
    },
};

use super::{HttpState, see_other};

const FOLLOW_FEED_PATH: &str = "/follow/";

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.list_follow_feed(user.id, query.number()).await {
        Ok(page) => {
            let (posts, paginator) = post_list(&page);
            render_template_response(
                FollowTemplate {
                    layout: LayoutView::new("Following", Some(&user)),
                    posts,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn follow(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow_username(user.id, &username).await {
        Ok((_, FollowOutcome::Created)) => see_other(FOLLOW_FEED_PATH),
        Ok((author, _)) => see_other(&profile_path(&author)),
        Err(err) => follow_error_response(err, &user),
    }
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow_username(user.id, &username).await {
        Ok((author, _)) => see_other(&profile_path(&author)),
        Err(err) => follow_error_response(err, &user),
    }
}

fn profile_path(author: &UserRecord) -> String {
    format!("/profile/{}/", author.username)
}

fn follow_error_response(err: FollowError, user: &UserRecord) -> Response {
    match err {
        FollowError::UnknownAuthor { .. } => render_not_found_response(
            LayoutView::new("Page not found", Some(user)),
            err.to_string(),
        ),
        FollowError::Repo(err) => HttpError::from(err).into_response(),
    }
}
