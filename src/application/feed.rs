use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, PageNumber, PageWindow, POSTS_PER_PAGE};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostListScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no group with slug `{slug}`")]
    UnknownGroup { slug: String },
    #[error("no user named `{username}`")]
    UnknownAuthor { username: String },
    #[error("post {id} does not exist")]
    UnknownPost { id: i64 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct AuthorFeed {
    pub author: UserRecord,
    pub post_count: u64,
    pub following: bool,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub title_text: String,
    pub author_post_count: u64,
    pub comments: Vec<CommentRecord>,
    pub post: PostRecord,
}

/// Read-only listings. Every listing is newest first and paginated.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            posts,
            comments,
            groups,
            users,
            follows,
        }
    }

    pub async fn list_index(&self, page: PageNumber) -> Result<Page<PostRecord>, FeedError> {
        self.page_of(PostListScope::All, page).await
    }

    pub async fn list_by_group(&self, slug: &str, page: PageNumber) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup {
                slug: slug.to_string(),
            })?;
        let page = self.page_of(PostListScope::Group(group.id), page).await?;
        Ok(GroupFeed { group, page })
    }

    /// `viewer` is the signed-in user, if any; anonymous viewers never follow.
    pub async fn list_by_author(
        &self,
        username: &str,
        viewer: Option<i64>,
        page: PageNumber,
    ) -> Result<AuthorFeed, FeedError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor {
                username: username.to_string(),
            })?;

        let page = self.page_of(PostListScope::Author(author.id), page).await?;
        let following = match viewer {
            Some(viewer_id) => self.follows.follow_exists(viewer_id, author.id).await?,
            None => false,
        };

        Ok(AuthorFeed {
            post_count: page.total,
            author,
            following,
            page,
        })
    }

    pub async fn list_follow_feed(
        &self,
        current_user: i64,
        page: PageNumber,
    ) -> Result<Page<PostRecord>, FeedError> {
        self.page_of(PostListScope::FollowedBy(current_user), page)
            .await
    }

    pub async fn post_detail(&self, id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(FeedError::UnknownPost { id })?;
        let author_post_count = self
            .posts
            .count_posts(PostListScope::Author(post.author.id))
            .await?;
        let comments = self.comments.list_comments(post.id).await?;

        Ok(PostDetail {
            title_text: post.title_text().to_string(),
            author_post_count,
            comments,
            post,
        })
    }

    async fn page_of(
        &self,
        scope: PostListScope,
        requested: PageNumber,
    ) -> Result<Page<PostRecord>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let window = PageWindow::resolve(requested, total, POSTS_PER_PAGE);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts.list_posts(scope, window.request()).await?
        };
        Ok(Page::from_window(items, window))
    }
}
