//! Persistent records as the store hands them back.

use time::OffsetDateTime;
use uuid::Uuid;

/// A registered author. Credentials live in [`UserCredentials`] and never travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub date_joined: OffsetDateTime,
}

impl UserRecord {
    /// Full name when one was given, otherwise the username.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

#[derive(Clone)]
pub struct UserCredentials {
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
}

/// Group columns joined onto a post row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostGroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// A post with its author (and group, if any) eagerly joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author: UserRecord,
    pub group: Option<PostGroupRef>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author: UserRecord,
    pub text: String,
    pub created: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FollowEdge {
    pub user_id: i64,
    pub author_id: i64,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub hashed_secret: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}
