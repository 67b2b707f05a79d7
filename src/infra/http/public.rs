use std::io::ErrorKind;

use axum::{
    Extension,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::error;

use crate::{
    application::{
        accounts::Viewer, error::HttpError, feed::FeedError, pagination::PageQuery,
    },
    infra::uploads::{UploadStorageError, has_image_extension},
    presentation::views::{
        AboutAuthorTemplate, AboutTechTemplate, AuthorView, CommentView, GroupTemplate,
        GroupView, IndexTemplate, LayoutView, PostCardView, PostDetailTemplate, PostDetailView,
        ProfileTemplate, post_list, render_not_found_response, render_template_response,
    },
};

use super::{HttpState, db_health_response, parse_id, redirect_with};

pub(super) async fn index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.list_index(query.number()).await {
        Ok(page) => {
            let (posts, paginator) = post_list(&page);
            render_template_response(
                IndexTemplate {
                    layout: LayoutView::new("Latest posts", viewer.user()),
                    posts,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, &viewer),
    }
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.list_by_group(&slug, query.number()).await {
        Ok(feed) => {
            let (posts, paginator) = post_list(&feed.page);
            render_template_response(
                GroupTemplate {
                    layout: LayoutView::new(feed.group.title.clone(), viewer.user()),
                    group: GroupView::from(&feed.group),
                    posts,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, &viewer),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .feed
        .list_by_author(&username, viewer.id(), query.number())
        .await
    {
        Ok(feed) => {
            let (posts, paginator) = post_list(&feed.page);
            let can_follow = viewer.id().is_some_and(|id| id != feed.author.id);
            render_template_response(
                ProfileTemplate {
                    layout: LayoutView::new(
                        format!("Profile of {}", feed.author.display_name()),
                        viewer.user(),
                    ),
                    author: AuthorView {
                        username: feed.author.username.clone(),
                        display_name: feed.author.display_name().to_string(),
                        post_count: feed.post_count,
                    },
                    can_follow,
                    following: feed.following,
                    posts,
                    paginator,
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, &viewer),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(
            LayoutView::new("Page not found", viewer.user()),
            format!("`{raw_id}` is not a post id"),
        );
    };

    match state.feed.post_detail(id).await {
        Ok(detail) => {
            let can_edit = viewer
                .id()
                .is_some_and(|viewer_id| detail.post.is_authored_by(viewer_id));
            render_template_response(
                PostDetailTemplate {
                    layout: LayoutView::new(detail.title_text.clone(), viewer.user()),
                    post: PostDetailView {
                        card: PostCardView::from(&detail.post),
                        title_text: detail.title_text,
                        author_post_count: detail.author_post_count,
                    },
                    can_edit,
                    can_comment: viewer.user().is_some(),
                    comments: detail.comments.iter().map(CommentView::from).collect(),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, &viewer),
    }
}

pub(super) async fn about_author(Extension(viewer): Extension<Viewer>) -> Response {
    render_template_response(
        AboutAuthorTemplate {
            layout: LayoutView::new("About the author", viewer.user()),
        },
        StatusCode::OK,
    )
}

pub(super) async fn about_tech(Extension(viewer): Extension<Viewer>) -> Response {
    render_template_response(
        AboutTechTemplate {
            layout: LayoutView::new("Technology", viewer.user()),
        },
        StatusCode::OK,
    )
}

pub(super) async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    let Some(mime) = media_type(&path) else {
        return HttpError::not_found(SOURCE, format!("`{path}` is not an image")).into_response();
    };

    match state.uploads.read(&path).await {
        Ok(bytes) => build_media_response(mime, bytes),
        Err(UploadStorageError::InvalidPath) => {
            HttpError::not_found(SOURCE, format!("rejected media path `{path}`")).into_response()
        }
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            HttpError::not_found(SOURCE, format!("no stored file at `{path}`")).into_response()
        }
        Err(err) => {
            error!(
                target: SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                &err,
            )
            .into_response()
        }
    }
}

/// Unknown routes. Slashless page paths get a permanent redirect to their slashed form.
pub(super) async fn fallback(request: Request<Body>) -> Response {
    if let Some(location) = slash_redirect_target(&request) {
        return redirect_with(StatusCode::PERMANENT_REDIRECT, &location);
    }

    let viewer = request
        .extensions()
        .get::<Viewer>()
        .cloned()
        .unwrap_or_default();
    render_not_found_response(
        LayoutView::new("Page not found", viewer.user()),
        format!("no route for `{}`", request.uri().path()),
    )
}

fn slash_redirect_target(request: &Request<Body>) -> Option<String> {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return None;
    }

    let path = request.uri().path();
    if path.ends_with('/') {
        return None;
    }
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    if last_segment.contains('.') {
        return None;
    }

    Some(match request.uri().query() {
        Some(query) => format!("{path}/?{query}"),
        None => format!("{path}/"),
    })
}

fn feed_error_response(err: FeedError, viewer: &Viewer) -> Response {
    match err {
        FeedError::UnknownGroup { .. }
        | FeedError::UnknownAuthor { .. }
        | FeedError::UnknownPost { .. } => render_not_found_response(
            LayoutView::new("Page not found", viewer.user()),
            err.to_string(),
        ),
        FeedError::Repo(err) => HttpError::from(err).into_response(),
    }
}

/// Only files with an image extension are served, and only as that image type.
fn media_type(path: &str) -> Option<mime_guess::Mime> {
    if !has_image_extension(path) {
        return None;
    }
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

fn build_media_response(mime: mime_guess::Mime, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
