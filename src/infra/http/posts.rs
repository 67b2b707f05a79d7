//! Authoring handlers: create, edit, delete and comment.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, multipart::Field};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    application::{
        accounts::CurrentUser,
        error::HttpError,
        posts::{INVALID_GROUP_MESSAGE, PostDraft, PostError},
    },
    domain::{
        entities::{PostRecord, UserRecord},
        forms::{FieldErrors, validate_text},
    },
    infra::uploads::{UploadStorageError, has_image_extension},
    presentation::views::{
        FormErrorsView, LayoutView, PostFormTemplate, media_url, render_not_found_response,
        render_template_response,
    },
};

use super::{HttpState, parse_id, see_other};

const SOURCE: &str = "infra::http::posts";
const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
const EMPTY_IMAGE_MESSAGE: &str = "The submitted file is empty.";

/// Parsed multipart post form. A stored image is already on disk.
#[derive(Debug, Default)]
struct PostFormInput {
    text: String,
    group_id: Option<i64>,
    image: Option<String>,
    clear_image: bool,
    errors: FieldErrors,
}

impl PostFormInput {
    /// Upload and group errors found while parsing, plus any text error.
    fn all_errors(&self) -> FieldErrors {
        let mut errors = self.errors.clone();
        if let Err(text_errors) = validate_text("text", &self.text) {
            errors.merge(text_errors);
        }
        errors
    }

    fn into_draft(self) -> PostDraft {
        PostDraft {
            text: self.text,
            group_id: self.group_id,
            image: self.image,
            clear_image: self.clear_image,
        }
    }
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Response {
    match state.posts.list_groups().await {
        Ok(groups) => render_template_response(
            PostFormTemplate {
                layout: LayoutView::new("New post", Some(&user)),
                is_edit: false,
                action: "/create/".to_string(),
                text: String::new(),
                groups: PostFormTemplate::group_options(&groups, None),
                current_image: None,
                errors: FormErrorsView::default(),
            },
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn create(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Response {
    let input = match read_post_form(&state, &mut multipart).await {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };

    if !input.errors.is_empty() {
        discard_image(&state, input.image.as_deref()).await;
        let errors = input.all_errors();
        return render_post_form(&state, &user, None, &input.text, input.group_id, errors).await;
    }

    let text = input.text.clone();
    let group_id = input.group_id;
    let image = input.image.clone();
    match state.posts.create(&user, input.into_draft()).await {
        Ok(_) => see_other(&format!("/profile/{}/", user.username)),
        Err(PostError::Invalid(errors)) => {
            discard_image(&state, image.as_deref()).await;
            render_post_form(&state, &user, None, &text, group_id, errors).await
        }
        Err(err) => {
            discard_image(&state, image.as_deref()).await;
            HttpError::from(err).into_response()
        }
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return missing_post(&user, &raw_id);
    };

    match state.posts.load_for_edit(user.id, id).await {
        Ok(post) => {
            let group_id = post.group.as_ref().map(|group| group.id);
            let text = post.text.clone();
            render_post_form(&state, &user, Some(&post), &text, group_id, FieldErrors::new())
                .await
        }
        Err(PostError::NotAuthor { post_id, actor }) => {
            info!(post_id, actor, "edit form requested by non-author; redirecting");
            see_other(&detail_path(id))
        }
        Err(err) => post_error_response(err, &user),
    }
}

pub(super) async fn edit(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return missing_post(&user, &raw_id);
    };

    let input = match read_post_form(&state, &mut multipart).await {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };

    let text = input.text.clone();
    let group_id = input.group_id;
    let image = input.image.clone();

    if !input.errors.is_empty() {
        discard_image(&state, image.as_deref()).await;
        let errors = input.all_errors();
        return match state.posts.load_for_edit(user.id, id).await {
            Ok(post) => {
                render_post_form(&state, &user, Some(&post), &text, group_id, errors).await
            }
            Err(PostError::NotAuthor { post_id, actor }) => {
                info!(post_id, actor, "edit by non-author ignored");
                see_other(&detail_path(id))
            }
            Err(err) => post_error_response(err, &user),
        };
    }

    match state.posts.edit(user.id, id, input.into_draft()).await {
        Ok(edited) => {
            discard_image(&state, edited.replaced_image.as_deref()).await;
            see_other(&detail_path(edited.post.id))
        }
        Err(PostError::NotAuthor { post_id, actor }) => {
            discard_image(&state, image.as_deref()).await;
            info!(post_id, actor, "edit by non-author ignored");
            see_other(&detail_path(id))
        }
        Err(PostError::Invalid(errors)) => {
            discard_image(&state, image.as_deref()).await;
            match state.posts.load_for_edit(user.id, id).await {
                Ok(post) => {
                    render_post_form(&state, &user, Some(&post), &text, group_id, errors).await
                }
                Err(err) => post_error_response(err, &user),
            }
        }
        Err(err) => {
            discard_image(&state, image.as_deref()).await;
            post_error_response(err, &user)
        }
    }
}

pub(super) async fn delete(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return missing_post(&user, &raw_id);
    };

    match state.posts.delete(user.id, id).await {
        Ok(post) => {
            discard_image(&state, post.image.as_deref()).await;
            see_other(&format!("/profile/{}/", post.author.username))
        }
        Err(PostError::NotAuthor { post_id, actor }) => {
            info!(post_id, actor, "delete by non-author ignored");
            see_other(&detail_path(id))
        }
        Err(err) => post_error_response(err, &user),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return missing_post(&user, &raw_id);
    };

    match state.posts.add_comment(&user, id, &form.text).await {
        Ok(_) | Err(PostError::Invalid(_)) => see_other(&detail_path(id)),
        Err(err) => post_error_response(err, &user),
    }
}

async fn render_post_form(
    state: &HttpState,
    user: &UserRecord,
    editing: Option<&PostRecord>,
    text: &str,
    group_id: Option<i64>,
    errors: FieldErrors,
) -> Response {
    let groups = match state.posts.list_groups().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let (title, action) = match editing {
        Some(post) => ("Edit post", format!("/posts/{}/edit/", post.id)),
        None => ("New post", "/create/".to_string()),
    };

    render_template_response(
        PostFormTemplate {
            layout: LayoutView::new(title, Some(user)),
            is_edit: editing.is_some(),
            action,
            text: text.to_string(),
            groups: PostFormTemplate::group_options(&groups, group_id),
            current_image: editing
                .and_then(|post| post.image.as_deref())
                .map(media_url),
            errors: FormErrorsView(errors),
        },
        StatusCode::OK,
    )
}

/// Parses the post form. On error any image stored so far is removed again.
async fn read_post_form(
    state: &HttpState,
    multipart: &mut Multipart,
) -> Result<PostFormInput, HttpError> {
    let mut input = PostFormInput::default();
    match read_post_fields(state, multipart, &mut input).await {
        Ok(()) => Ok(input),
        Err(err) => {
            discard_image(state, input.image.as_deref()).await;
            Err(err)
        }
    }
}

async fn read_post_fields(
    state: &HttpState,
    multipart: &mut Multipart,
    input: &mut PostFormInput,
) -> Result<(), HttpError> {
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        let status = err.status();
        HttpError::from_error(
            SOURCE,
            status,
            if status == StatusCode::PAYLOAD_TOO_LARGE {
                "Uploaded file is too large"
            } else {
                "Request could not be processed"
            },
            &err,
        )
    })? {
        match field.name() {
            Some("text") => input.text = read_text(field).await?,
            Some("group") => {
                let raw = read_text(field).await?;
                match raw.trim() {
                    "" => input.group_id = None,
                    value => match value.parse::<i64>() {
                        Ok(id) => input.group_id = Some(id),
                        Err(_) => input.errors.add("group", INVALID_GROUP_MESSAGE),
                    },
                }
            }
            Some("image-clear") => {
                let raw = read_text(field).await?;
                input.clear_image = matches!(raw.trim(), "on" | "true" | "1");
            }
            Some("image") => {
                if let Some(stored) = store_image(state, field, &mut input.errors).await? {
                    discard_image(state, input.image.as_deref()).await;
                    input.image = Some(stored);
                }
            }
            _ => continue,
        }
    }
    Ok(())
}

async fn read_text(field: Field) -> Result<String, HttpError> {
    field.text().await.map_err(|err| {
        HttpError::from_error(
            SOURCE,
            err.status(),
            "Request could not be processed",
            &err,
        )
    })
}

/// Stores an uploaded image. `Ok(None)` when no file was chosen or it was rejected.
async fn store_image(
    state: &HttpState,
    field: Field,
    errors: &mut FieldErrors,
) -> Result<Option<String>, HttpError> {
    let filename = field
        .file_name()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if filename.is_empty() {
        return Ok(None);
    }

    let is_image = field
        .content_type()
        .is_some_and(|mime| mime.starts_with("image/"))
        && has_image_extension(&filename);
    if !is_image {
        errors.add("image", INVALID_IMAGE_MESSAGE);
        return Ok(None);
    }

    let stream = field.map(|chunk| {
        chunk.map_err(|err| {
            if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                UploadStorageError::PayloadTooLarge {
                    source: Box::new(err),
                }
            } else {
                UploadStorageError::PayloadStream {
                    source: Box::new(err),
                }
            }
        })
    });

    match state.uploads.store_stream(&filename, stream).await {
        Ok(stored) => Ok(Some(stored.stored_path)),
        Err(UploadStorageError::EmptyPayload) => {
            errors.add("image", EMPTY_IMAGE_MESSAGE);
            Ok(None)
        }
        Err(UploadStorageError::NotAnImage) => {
            errors.add("image", INVALID_IMAGE_MESSAGE);
            Ok(None)
        }
        Err(err @ UploadStorageError::PayloadTooLarge { .. }) => Err(HttpError::from_error(
            SOURCE,
            StatusCode::PAYLOAD_TOO_LARGE,
            "Uploaded file is too large",
            &err,
        )),
        Err(err @ UploadStorageError::PayloadStream { .. }) => Err(HttpError::from_error(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            &err,
        )),
        Err(err) => Err(HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store uploaded file",
            &err,
        )),
    }
}

/// Best effort: a leftover file is logged, never surfaced.
async fn discard_image(state: &HttpState, stored_path: Option<&str>) {
    if let Some(path) = stored_path
        && let Err(err) = state.uploads.delete(path).await
    {
        warn!(path, error = %err, "failed to delete stored image");
    }
}

fn post_error_response(err: PostError, user: &UserRecord) -> Response {
    match err {
        PostError::NotFound { id } => missing_post(user, &id.to_string()),
        err => HttpError::from(err).into_response(),
    }
}

fn missing_post(user: &UserRecord, raw_id: &str) -> Response {
    render_not_found_response(
        LayoutView::new("Page not found", Some(user)),
        format!("post `{raw_id}` does not exist"),
    )
}

fn detail_path(id: i64) -> String {
    format!("/posts/{id}/")
}
