use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, SessionsRepo};
use crate::domain::entities::SessionRecord;

use super::types::SessionRow;
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn create_session(&self, session: SessionRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, hashed_secret, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.hashed_secret)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, hashed_secret, created_at, expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SessionRecord::from))
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
