use async_trait::async_trait;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;

use super::types::GroupRow;
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl GroupsRepo for PostgresRepositories {
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, slug, title, description FROM groups WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(GroupRecord::from))
    }

    async fn find_group(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, slug, title, description FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(GroupRecord::from))
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, slug, title, description FROM groups ORDER BY LOWER(title), slug",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        sqlx::query_as::<_, GroupRow>(
            r#"
            INSERT INTO groups (slug, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, slug, title, description
            "#,
        )
        .bind(params.slug)
        .bind(params.title)
        .bind(params.description)
        .fetch_one(self.pool())
        .await
        .map(GroupRecord::from)
        .map_err(map_sqlx_error)
    }
}
