use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    CommentRecord, GroupRecord, PostGroupRef, PostRecord, SessionRecord, UserCredentials,
    UserRecord,
};

/// Post columns plus the joined author and (optional) group.
pub(crate) const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, \
     u.id AS author_id, u.username AS author_username, u.full_name AS author_full_name, \
     u.date_joined AS author_date_joined, \
     g.id AS group_id, g.slug AS group_slug, g.title AS group_title \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id ";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) text: String,
    pub(crate) pub_date: OffsetDateTime,
    pub(crate) image: Option<String>,
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_full_name: String,
    pub(crate) author_date_joined: OffsetDateTime,
    pub(crate) group_id: Option<i64>,
    pub(crate) group_slug: Option<String>,
    pub(crate) group_title: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(PostGroupRef { id, slug, title }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author: UserRecord {
                id: row.author_id,
                username: row.author_username,
                full_name: row.author_full_name,
                date_joined: row.author_date_joined,
            },
            group,
            image: row.image,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub(crate) id: i64,
    pub(crate) post_id: i64,
    pub(crate) text: String,
    pub(crate) created: OffsetDateTime,
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_full_name: String,
    pub(crate) author_date_joined: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author: UserRecord {
                id: row.author_id,
                username: row.author_username,
                full_name: row.author_full_name,
                date_joined: row.author_date_joined,
            },
            text: row.text,
            created: row.created,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct GroupRow {
    pub(crate) id: i64,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) description: String,
}

impl From<GroupRow> for GroupRecord {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) date_joined: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            date_joined: row.date_joined,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CredentialsRow {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) date_joined: OffsetDateTime,
    pub(crate) password_hash: String,
}

impl From<CredentialsRow> for UserCredentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            user: UserRecord {
                id: row.id,
                username: row.username,
                full_name: row.full_name,
                date_joined: row.date_joined,
            },
            password_hash: row.password_hash,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub(crate) id: Uuid,
    pub(crate) user_id: i64,
    pub(crate) hashed_secret: Vec<u8>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) expires_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}
