use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("no user named `{username}`")]
    UnknownAuthor { username: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollow,
}

/// Directed follow edges between users; at most one edge per ordered pair.
#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(&self, follower: i64, author: i64) -> Result<FollowOutcome, FollowError> {
        if follower == author {
            return Ok(FollowOutcome::SelfFollow);
        }
        if self.follows.follow_exists(follower, author).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        // A concurrent insert of the same edge lands here as `false`.
        let created = self.follows.insert_follow(follower, author).await?;
        debug!(follower, author, created, "follow edge requested");
        Ok(if created {
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        })
    }

    /// Returns whether an edge was removed.
    pub async fn unfollow(&self, follower: i64, author: i64) -> Result<bool, FollowError> {
        let removed = self.follows.delete_follow(follower, author).await?;
        debug!(follower, author, removed, "unfollow requested");
        Ok(removed)
    }

    pub async fn is_following(&self, follower: i64, author: i64) -> Result<bool, FollowError> {
        Ok(self.follows.follow_exists(follower, author).await?)
    }

    pub async fn follow_username(
        &self,
        follower: i64,
        username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.resolve_author(username).await?;
        let outcome = self.follow(follower, author.id).await?;
        Ok((author, outcome))
    }

    pub async fn unfollow_username(
        &self,
        follower: i64,
        username: &str,
    ) -> Result<(UserRecord, bool), FollowError> {
        let author = self.resolve_author(username).await?;
        let removed = self.unfollow(follower, author.id).await?;
        Ok((author, removed))
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor {
                username: username.to_string(),
            })
    }
}
