use async_trait::async_trait;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::{UserCredentials, UserRecord};

use super::types::{CredentialsRow, UserRow};
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, full_name, date_joined FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, full_name, date_joined FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepoError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r#"
            SELECT id, username, full_name, date_joined, password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserCredentials::from))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, full_name, password_hash, date_joined)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, full_name, date_joined
            "#,
        )
        .bind(params.username)
        .bind(params.full_name)
        .bind(params.password_hash)
        .bind(params.date_joined)
        .fetch_one(self.pool())
        .await
        .map(UserRecord::from)
        .map_err(map_sqlx_error)
    }
}
