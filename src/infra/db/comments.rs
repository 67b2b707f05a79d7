use async_trait::async_trait;

use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::CommentRecord;

use super::types::CommentRow;
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.post_id, c.text, c.created,
                   u.id AS author_id, u.username AS author_username,
                   u.full_name AS author_full_name, u.date_joined AS author_date_joined
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created DESC, c.id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        sqlx::query_as::<_, CommentRow>(
            r#"
            WITH written AS (
                INSERT INTO comments (post_id, author_id, text, created)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT c.id, c.post_id, c.text, c.created,
                   u.id AS author_id, u.username AS author_username,
                   u.full_name AS author_full_name, u.date_joined AS author_date_joined
            FROM written c
            INNER JOIN users u ON u.id = c.author_id
            "#,
        )
        .bind(params.post_id)
        .bind(params.author_id)
        .bind(params.text)
        .bind(params.created)
        .fetch_one(self.pool())
        .await
        .map(CommentRecord::from)
        .map_err(map_sqlx_error)
    }
}
