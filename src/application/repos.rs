//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::entities::{
    CommentRecord, GroupRecord, PostRecord, SessionRecord, UserCredentials, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which posts a listing covers. Every scope is ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostListScope {
    All,
    Group(i64),
    Author(i64),
    /// Posts whose author is followed by the given user.
    FollowedBy(i64),
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
    pub pub_date: OffsetDateTime,
}

/// Full replacement of the editable columns; `pub_date` and author never change.
#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub slug: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub date_joined: OffsetDateTime,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError>;

    async fn list_posts(
        &self,
        scope: PostListScope,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Removes the post and its comments. Returns `false` when nothing matched.
    async fn delete_post(&self, id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments of one post, newest first.
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_group(&self, id: i64) -> Result<Option<GroupRecord>, RepoError>;

    /// All groups ordered by title.
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;

    async fn find_credentials(&self, username: &str)
    -> Result<Option<UserCredentials>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Inserts the edge unless it exists. Returns `true` when a row was written.
    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    async fn follow_exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, session: SessionRecord) -> Result<(), RepoError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_session(&self, id: Uuid) -> Result<bool, RepoError>;

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
