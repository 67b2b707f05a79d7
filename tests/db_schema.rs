//! Schema checks against a live Postgres. Run with `DATABASE_URL` set and `--ignored`.

use std::collections::HashSet;

use sqlx::PgPool;
use time::OffsetDateTime;

use scribbly::application::pagination::PageRequest;
use scribbly::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, CreateUserParams, FollowsRepo,
    PostListScope, PostsRepo, PostsWriteRepo, RepoError, UsersRepo,
};
use scribbly::domain::entities::UserRecord;
use scribbly::infra::db::PostgresRepositories;

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            full_name: String::new(),
            password_hash: "unused".to_string(),
            date_joined: OffsetDateTime::now_utc(),
        })
        .await
        .expect("create user")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn listing_indexes_exist(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = 'posts'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch post indexes");

    let indexes: HashSet<String> = rows.into_iter().collect();
    for expected in [
        "posts_pub_date_idx",
        "posts_author_pub_date_idx",
        "posts_group_pub_date_idx",
    ] {
        assert!(indexes.contains(expected), "missing {expected}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn deleting_a_post_cascades_to_comments(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "author").await;

    let post = repos
        .create_post(CreatePostParams {
            author_id: author.id,
            text: "cascade me".into(),
            group_id: None,
            image: None,
            pub_date: OffsetDateTime::now_utc(),
        })
        .await
        .expect("create post");
    repos
        .create_comment(CreateCommentParams {
            post_id: post.id,
            author_id: author.id,
            text: "doomed".into(),
            created: OffsetDateTime::now_utc(),
        })
        .await
        .expect("create comment");

    assert!(repos.delete_post(post.id).await.expect("delete"));
    assert!(repos.list_comments(post.id).await.expect("comments").is_empty());
    assert_eq!(repos.count_posts(PostListScope::All).await.expect("count"), 0);
    let listed = repos
        .list_posts(PostListScope::All, PageRequest { limit: 10, offset: 0 })
        .await
        .expect("list");
    assert!(listed.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn follow_edges_are_unique(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let reader = user(&repos, "reader").await;
    let writer = user(&repos, "writer").await;

    assert!(repos.insert_follow(reader.id, writer.id).await.expect("insert"));
    assert!(!repos.insert_follow(reader.id, writer.id).await.expect("insert"));
    assert!(repos.follow_exists(reader.id, writer.id).await.expect("exists"));

    let duplicate = repos
        .create_user(CreateUserParams {
            username: "reader".into(),
            full_name: String::new(),
            password_hash: "unused".into(),
            date_joined: OffsetDateTime::now_utc(),
        })
        .await;
    assert!(matches!(duplicate, Err(RepoError::Duplicate { .. })));
}
