use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreatePostParams, PostListScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::PostRecord;

use super::types::{POST_SELECT, PostRow};
use super::{PostgresRepositories, map_sqlx_error};

impl PostgresRepositories {
    fn apply_scope_conditions(qb: &mut QueryBuilder<'_, Postgres>, scope: PostListScope) {
        match scope {
            PostListScope::All => {}
            PostListScope::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(group_id);
            }
            PostListScope::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(author_id);
            }
            PostListScope::FollowedBy(user_id) => {
                qb.push(" AND p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ");
                qb.push_bind(user_id);
                qb.push(")");
            }
        }
    }

    /// Closes an open `WITH written AS (... RETURNING *` and reads the row back with its joins.
    async fn fetch_written_post(
        &self,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> Result<PostRecord, RepoError> {
        qb.push(
            ") SELECT p.id, p.text, p.pub_date, p.image, \
             u.id AS author_id, u.username AS author_username, u.full_name AS author_full_name, \
             u.date_joined AS author_date_joined, \
             g.id AS group_id, g.slug AS group_slug, g.title AS group_title \
             FROM written p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id",
        );

        qb.build_query_as::<PostRow>()
            .fetch_one(self.pool())
            .await
            .map(PostRecord::from)
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_scope_conditions(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostListScope,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(page.offset).map_err(|_| RepoError::InvalidInput {
            message: "page offset exceeds supported range".to_string(),
        })?;

        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE 1=1 ");
        Self::apply_scope_conditions(&mut qb, scope);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::new(
            "WITH written AS (INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (",
        );
        let mut values = qb.separated(", ");
        values.push_bind(params.text);
        values.push_bind(params.pub_date);
        values.push_bind(params.author_id);
        values.push_bind(params.group_id);
        values.push_bind(params.image);
        qb.push(") RETURNING *");

        self.fetch_written_post(qb).await
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::new("WITH written AS (UPDATE posts SET text = ");
        qb.push_bind(params.text);
        qb.push(", group_id = ");
        qb.push_bind(params.group_id);
        qb.push(", image = ");
        qb.push_bind(params.image);
        qb.push(" WHERE id = ");
        qb.push_bind(params.id);
        qb.push(" RETURNING *");

        self.fetch_written_post(qb).await
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
