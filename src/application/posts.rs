//! Authoring: creating, editing and deleting posts, and commenting on them.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::forms::{FieldErrors, validate_text};

pub const INVALID_GROUP_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post {id} does not exist")]
    NotFound { id: i64 },
    #[error("user {actor} is not the author of post {post_id}")]
    NotAuthor { post_id: i64, actor: i64 },
    #[error("invalid post form: {0}")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Submitted post form. `image` is the stored path of a freshly uploaded file.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct EditedPost {
    pub post: PostRecord,
    /// Stored file no longer referenced after the edit.
    pub replaced_image: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writes: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writes: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        groups: Arc<dyn GroupsRepo>,
    ) -> Self {
        Self {
            posts,
            writes,
            comments,
            groups,
        }
    }

    /// Choices for the group selector.
    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create(&self, author: &UserRecord, draft: PostDraft) -> Result<PostRecord, PostError> {
        let (text, group_id) = self.validate(&draft).await?;
        let post = self
            .writes
            .create_post(CreatePostParams {
                author_id: author.id,
                text,
                group_id,
                image: draft.image,
                pub_date: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(post_id = post.id, author = author.id, "post created");
        Ok(post)
    }

    /// The post when `actor` may edit it.
    pub async fn load_for_edit(&self, actor: i64, post_id: i64) -> Result<PostRecord, PostError> {
        let post = self.load(post_id).await?;
        ensure_author(&post, actor)?;
        Ok(post)
    }

    pub async fn edit(
        &self,
        actor: i64,
        post_id: i64,
        draft: PostDraft,
    ) -> Result<EditedPost, PostError> {
        let current = self.load_for_edit(actor, post_id).await?;
        let (text, group_id) = self.validate(&draft).await?;

        let (image, replaced_image) = match (draft.image, draft.clear_image) {
            (Some(new_image), _) => (Some(new_image), current.image.clone()),
            (None, true) => (None, current.image.clone()),
            (None, false) => (current.image.clone(), None),
        };

        let post = self
            .writes
            .update_post(UpdatePostParams {
                id: post_id,
                text,
                group_id,
                image,
            })
            .await?;

        info!(post_id, actor, "post edited");
        Ok(EditedPost {
            post,
            replaced_image,
        })
    }

    /// Deletes the post and, through the store, its comments. Returns the removed post.
    pub async fn delete(&self, actor: i64, post_id: i64) -> Result<PostRecord, PostError> {
        let post = self.load_for_edit(actor, post_id).await?;
        if !self.writes.delete_post(post_id).await? {
            return Err(PostError::NotFound { id: post_id });
        }

        info!(post_id, actor, "post deleted");
        Ok(post)
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self.load(post_id).await?;
        let text = validate_text("text", text).map_err(PostError::Invalid)?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
                created: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(comment)
    }

    async fn load(&self, post_id: i64) -> Result<PostRecord, PostError> {
        self.posts
            .find_post(post_id)
            .await?
            .ok_or(PostError::NotFound { id: post_id })
    }

    async fn validate(&self, draft: &PostDraft) -> Result<(String, Option<i64>), PostError> {
        let mut errors = FieldErrors::new();

        let text = match validate_text("text", &draft.text) {
            Ok(text) => Some(text),
            Err(field_errors) => {
                errors.merge(field_errors);
                None
            }
        };

        if let Some(group_id) = draft.group_id
            && self.groups.find_group(group_id).await?.is_none()
        {
            errors.add("group", INVALID_GROUP_MESSAGE);
        }

        match text {
            Some(text) if errors.is_empty() => Ok((text, draft.group_id)),
            _ => Err(PostError::Invalid(errors)),
        }
    }
}

fn ensure_author(post: &PostRecord, actor: i64) -> Result<(), PostError> {
    if post.is_authored_by(actor) {
        Ok(())
    } else {
        Err(PostError::NotAuthor {
            post_id: post.id,
            actor,
        })
    }
}
