//! In-memory store and router fixtures shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use scribbly::application::{
    accounts::{AccountService, hash_password},
    feed::FeedService,
    follow::FollowService,
    groups::GroupService,
    pagination::PageRequest,
    posts::PostService,
    repos::{
        CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
        FollowsRepo, GroupsRepo, PostListScope, PostsRepo, PostsWriteRepo, RepoError,
        SessionsRepo, StoreHealth, UpdatePostParams, UsersRepo,
    },
};
use scribbly::cache::{CacheConfig, ResponseCache};
use scribbly::domain::entities::{
    CommentRecord, GroupRecord, PostGroupRef, PostRecord, SessionRecord, UserCredentials,
    UserRecord,
};
use scribbly::infra::http::{CookieSettings, HttpState, SESSION_COOKIE, build_router};
use scribbly::infra::uploads::UploadStorage;

#[derive(Clone)]
struct StoredUser {
    record: UserRecord,
    password_hash: String,
}

#[derive(Clone)]
struct StoredPost {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Clone)]
struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<StoredUser>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: Vec<(i64, i64)>,
    sessions: Vec<SessionRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: i64) -> Result<UserRecord, RepoError> {
        self.users
            .iter()
            .find(|user| user.record.id == id)
            .map(|user| user.record.clone())
            .ok_or_else(|| RepoError::Integrity {
                message: format!("dangling user {id}"),
            })
    }

    fn hydrate(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let group = post.group_id.and_then(|id| {
            self.groups.iter().find(|group| group.id == id).map(|group| PostGroupRef {
                id: group.id,
                slug: group.slug.clone(),
                title: group.title.clone(),
            })
        });
        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            author: self.user(post.author_id)?,
            group,
            image: post.image.clone(),
        })
    }

    fn in_scope(&self, post: &StoredPost, scope: PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(id) => post.group_id == Some(id),
            PostListScope::Author(id) => post.author_id == id,
            PostListScope::FollowedBy(user) => self
                .follows
                .iter()
                .any(|(follower, author)| *follower == user && *author == post.author_id),
        }
    }

    fn scoped(&self, scope: PostListScope) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| self.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// Implements every repository trait over vectors, with the schema's cascade rules.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn add_user(&self, username: &str) -> UserRecord {
        let mut tables = self.tables.lock().await;
        let record = UserRecord {
            id: tables.next_id(),
            username: username.to_string(),
            full_name: String::new(),
            date_joined: OffsetDateTime::now_utc(),
        };
        tables.users.push(StoredUser {
            record: record.clone(),
            password_hash: String::new(),
        });
        record
    }

    /// A user who can log in with `password`.
    pub async fn add_user_with_password(&self, username: &str, password: &str) -> UserRecord {
        let record = self.add_user(username).await;
        let hash = hash_password(password).expect("hash password");
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|user| user.record.id == record.id) {
            user.password_hash = hash;
        }
        record
    }

    pub async fn add_group(&self, slug: &str, title: &str) -> GroupRecord {
        let mut tables = self.tables.lock().await;
        let record = GroupRecord {
            id: tables.next_id(),
            slug: slug.to_string(),
            title: title.to_string(),
            description: String::new(),
        };
        tables.groups.push(record.clone());
        record
    }

    /// Posts get strictly increasing publication times.
    pub async fn add_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> i64 {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.posts.push(StoredPost {
            id,
            text: text.to_string(),
            pub_date: OffsetDateTime::UNIX_EPOCH + Duration::minutes(id),
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        });
        id
    }

    pub async fn post_text(&self, id: i64) -> Option<String> {
        let tables = self.tables.lock().await;
        tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| post.text.clone())
    }

    pub async fn comment_count(&self, post_id: i64) -> usize {
        let tables = self.tables.lock().await;
        tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .count()
    }

    pub async fn follow_count(&self) -> usize {
        self.tables.lock().await.follows.len()
    }

    pub async fn post_count(&self) -> usize {
        self.tables.lock().await.posts.len()
    }

    pub async fn post_images(&self) -> Vec<String> {
        let tables = self.tables.lock().await;
        tables
            .posts
            .iter()
            .filter_map(|post| post.image.clone())
            .collect()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    /// Moves every session's expiry into the past.
    pub async fn expire_sessions(&self) {
        let past = OffsetDateTime::now_utc() - Duration::minutes(1);
        let mut tables = self.tables.lock().await;
        for session in &mut tables.sessions {
            session.expires_at = past;
        }
    }

    /// Opens a session directly and returns the cookie token for it.
    pub async fn open_session(&self, user: &UserRecord) -> String {
        let id = Uuid::new_v4();
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables.lock().await;
        tables.sessions.push(SessionRecord {
            id,
            user_id: user.id,
            hashed_secret: Sha256::digest(secret.as_bytes()).to_vec(),
            created_at: now,
            expires_at: now + Duration::hours(1),
        });
        format!("{id}.{secret}")
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        Ok(self.tables.lock().await.scoped(scope).len() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostListScope,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.tables.lock().await;
        tables
            .scoped(scope)
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|post| tables.hydrate(post))
            .collect()
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let tables = self.tables.lock().await;
        tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.hydrate(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let post = StoredPost {
            id,
            text: params.text,
            pub_date: params.pub_date,
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        tables.posts.push(post.clone());
        tables.hydrate(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let post = post.clone();
        tables.hydrate(&post)
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.posts.len();
        tables.posts.retain(|post| post.id != id);
        tables.comments.retain(|comment| comment.post_id != id);
        Ok(tables.posts.len() != before)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let tables = self.tables.lock().await;
        let mut comments: Vec<&StoredComment> = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        comments
            .into_iter()
            .map(|comment| {
                Ok(CommentRecord {
                    id: comment.id,
                    post_id: comment.post_id,
                    author: tables.user(comment.author_id)?,
                    text: comment.text.clone(),
                    created: comment.created,
                })
            })
            .collect()
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::InvalidInput {
                message: "post does not exist".into(),
            });
        }
        let id = tables.next_id();
        tables.comments.push(StoredComment {
            id,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text.clone(),
            created: params.created,
        });
        Ok(CommentRecord {
            id,
            post_id: params.post_id,
            author: tables.user(params.author_id)?,
            text: params.text,
            created: params.created,
        })
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_group(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.tables.lock().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".into(),
            });
        }
        let record = GroupRecord {
            id: tables.next_id(),
            slug: params.slug,
            title: params.title,
            description: params.description,
        };
        tables.groups.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.tables.lock().await.user(id).ok())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.record.username == username)
            .map(|user| user.record.clone()))
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.record.username == username)
            .map(|user| UserCredentials {
                user: user.record.clone(),
                password_hash: user.password_hash.clone(),
            }))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .iter()
            .any(|user| user.record.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".into(),
            });
        }
        let record = UserRecord {
            id: tables.next_id(),
            username: params.username,
            full_name: params.full_name,
            date_joined: params.date_joined,
        };
        tables.users.push(StoredUser {
            record: record.clone(),
            password_hash: params.password_hash,
        });
        Ok(record)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        tables.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.follows.len();
        tables.follows.retain(|edge| *edge != (user_id, author_id));
        Ok(tables.follows.len() != before)
    }

    async fn follow_exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .tables
            .lock()
            .await
            .follows
            .contains(&(user_id, author_id)))
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(&self, session: SessionRecord) -> Result<(), RepoError> {
        self.tables.lock().await.sessions.push(session);
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.iter().find(|session| session.id == id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|session| session.id != id);
        Ok(tables.sessions.len() != before)
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|session| session.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub fn feed_service(store: &Arc<MemoryStore>) -> FeedService {
    FeedService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    )
}

pub fn post_service(store: &Arc<MemoryStore>) -> PostService {
    PostService::new(store.clone(), store.clone(), store.clone(), store.clone())
}

pub fn follow_service(store: &Arc<MemoryStore>) -> FollowService {
    FollowService::new(store.clone(), store.clone())
}

pub fn account_service(store: &Arc<MemoryStore>) -> AccountService {
    AccountService::new(store.clone(), store.clone(), Duration::hours(1))
}

pub fn group_service(store: &Arc<MemoryStore>) -> GroupService {
    GroupService::new(store.clone())
}

/// Every file below `root`, directories excluded.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(dir).expect("read dir").flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}

/// A router over the memory store. Keep the [`TempDir`] alive for the test's duration.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<ResponseCache>,
    pub router: Router,
    media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(config: CacheConfig) -> Self {
        let store = MemoryStore::new();
        let media = tempfile::tempdir().expect("temp media dir");
        let uploads = UploadStorage::new(media.path().to_path_buf()).expect("upload storage");
        let cache = Arc::new(ResponseCache::new(&config));

        let state = HttpState {
            feed: Arc::new(feed_service(&store)),
            posts: Arc::new(post_service(&store)),
            follows: Arc::new(follow_service(&store)),
            accounts: Arc::new(account_service(&store)),
            health: store.clone(),
            uploads: Arc::new(uploads),
            cache: cache.clone(),
            cookies: CookieSettings {
                secure: false,
                ttl: Duration::hours(1),
            },
            upload_limit_bytes: 1024 * 1024,
        };

        Self {
            store,
            cache,
            router: build_router(state),
            media,
        }
    }

    pub fn media_root(&self) -> &Path {
        self.media.path()
    }

    pub fn media_files(&self) -> Vec<PathBuf> {
        files_under(self.media.path())
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn get_as(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .body(Body::empty())
        .expect("request")
}

pub fn post_form_as(uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub const BOUNDARY: &str = "scribbly-test-boundary";

/// A 1x1 PNG.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Builds `multipart/form-data` bodies delimited by [`BOUNDARY`].
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }

    /// Opens a text part and ends the body inside it, as a dropped connection would.
    pub fn cut_off_in_text(mut self, name: &str, partial_value: &str) -> Vec<u8> {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{partial_value}"
            )
            .as_bytes(),
        );
        self.bytes
    }
}

/// Multipart body with plain text fields only.
pub fn post_multipart_as(uri: &str, token: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .fold(MultipartBody::new(), |body, (name, value)| body.text(name, value))
        .finish();
    post_multipart_body_as(uri, token, body)
}

pub fn post_multipart_body_as(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

pub fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
