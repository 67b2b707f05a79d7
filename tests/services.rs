mod support;

use scribbly::application::{
    accounts::{AccountError, DUPLICATE_USERNAME_MESSAGE, SignupDraft},
    feed::FeedError,
    follow::FollowOutcome,
    groups::GroupError,
    pagination::PageNumber,
    posts::{PostDraft, PostError},
};
use scribbly::domain::error::DomainError;
use support::{
    MemoryStore, account_service, feed_service, follow_service, group_service, post_service,
};

fn signup_draft(username: &str, password: &str, confirm: &str) -> SignupDraft {
    SignupDraft {
        username: username.to_string(),
        full_name: "Leo Tolstoy".to_string(),
        password: password.to_string(),
        password_confirm: confirm.to_string(),
    }
}

#[tokio::test]
async fn index_pages_cover_every_post_once_newest_first() {
    let store = MemoryStore::new();
    let author = store.add_user("leo").await;
    let mut ids = Vec::new();
    for n in 0..23 {
        ids.push(store.add_post(&author, &format!("post {n}"), None).await);
    }
    ids.reverse();

    let feed = feed_service(&store);
    let mut seen = Vec::new();
    for number in 1..=3 {
        let page = feed.list_index(PageNumber::new(number)).await.expect("page");
        assert!(page.items.len() <= 10);
        assert_eq!(page.num_pages, 3);
        seen.extend(page.items.iter().map(|post| post.id));
    }
    assert_eq!(seen, ids);

    let out_of_range = feed.list_index(PageNumber::new(99)).await.expect("page");
    assert_eq!(out_of_range.number, 3);
    assert_eq!(out_of_range.items.len(), 3);
}

#[tokio::test]
async fn group_feed_only_lists_group_posts() {
    let store = MemoryStore::new();
    let author = store.add_user("leo").await;
    let cats = store.add_group("cats", "Cats").await;
    store.add_post(&author, "meow", Some(&cats)).await;
    store.add_post(&author, "ungrouped", None).await;

    let feed = feed_service(&store);
    let group_feed = feed
        .list_by_group("cats", PageNumber::FIRST)
        .await
        .expect("group feed");
    assert_eq!(group_feed.group.title, "Cats");
    assert_eq!(group_feed.page.total, 1);
    assert_eq!(group_feed.page.items[0].text, "meow");

    let missing = feed.list_by_group("dogs", PageNumber::FIRST).await;
    assert!(matches!(missing, Err(FeedError::UnknownGroup { .. })));
}

#[tokio::test]
async fn follow_is_idempotent_and_never_self_referential() {
    let store = MemoryStore::new();
    let reader = store.add_user("reader").await;
    let writer = store.add_user("writer").await;
    let follows = follow_service(&store);

    assert_eq!(
        follows.follow(reader.id, writer.id).await.expect("follow"),
        FollowOutcome::Created
    );
    assert_eq!(
        follows.follow(reader.id, writer.id).await.expect("follow"),
        FollowOutcome::AlreadyFollowing
    );
    assert_eq!(store.follow_count().await, 1);

    assert_eq!(
        follows.follow(reader.id, reader.id).await.expect("follow"),
        FollowOutcome::SelfFollow
    );
    assert_eq!(store.follow_count().await, 1);

    assert!(follows.unfollow(reader.id, writer.id).await.expect("unfollow"));
    assert!(!follows.unfollow(reader.id, writer.id).await.expect("unfollow"));
    assert_eq!(store.follow_count().await, 0);
}

#[tokio::test]
async fn follow_feed_lists_followed_authors_only() {
    let store = MemoryStore::new();
    let reader = store.add_user("reader").await;
    let followed = store.add_user("followed").await;
    let stranger = store.add_user("stranger").await;
    store.add_post(&followed, "from followed", None).await;
    store.add_post(&stranger, "from stranger", None).await;

    follow_service(&store)
        .follow(reader.id, followed.id)
        .await
        .expect("follow");

    let page = feed_service(&store)
        .list_follow_feed(reader.id, PageNumber::FIRST)
        .await
        .expect("follow feed");
    let texts: Vec<&str> = page.items.iter().map(|post| post.text.as_str()).collect();
    assert_eq!(texts, vec!["from followed"]);
}

#[tokio::test]
async fn profile_reports_follow_state_for_the_viewer() {
    let store = MemoryStore::new();
    let reader = store.add_user("reader").await;
    let writer = store.add_user("writer").await;
    follow_service(&store)
        .follow(reader.id, writer.id)
        .await
        .expect("follow");

    let feed = feed_service(&store);
    let as_reader = feed
        .list_by_author("writer", Some(reader.id), PageNumber::FIRST)
        .await
        .expect("profile");
    assert!(as_reader.following);

    let anonymous = feed
        .list_by_author("writer", None, PageNumber::FIRST)
        .await
        .expect("profile");
    assert!(!anonymous.following);
}

#[tokio::test]
async fn deleting_a_post_removes_comments_and_listings() {
    let store = MemoryStore::new();
    let author = store.add_user("leo").await;
    let post_id = store.add_post(&author, "short lived", None).await;
    let posts = post_service(&store);
    posts
        .add_comment(&author, post_id, "first!")
        .await
        .expect("comment");
    assert_eq!(store.comment_count(post_id).await, 1);

    let removed = posts.delete(author.id, post_id).await.expect("delete");
    assert_eq!(removed.id, post_id);
    assert_eq!(store.comment_count(post_id).await, 0);

    let feed = feed_service(&store);
    let index = feed.list_index(PageNumber::FIRST).await.expect("index");
    assert!(index.items.is_empty());
    assert!(matches!(
        feed.post_detail(post_id).await,
        Err(FeedError::UnknownPost { .. })
    ));
}

#[tokio::test]
async fn only_the_author_may_edit() {
    let store = MemoryStore::new();
    let author = store.add_user("author").await;
    let other = store.add_user("other").await;
    let post_id = store.add_post(&author, "original", None).await;
    let posts = post_service(&store);

    let draft = PostDraft {
        text: "hijacked".into(),
        ..PostDraft::default()
    };
    let result = posts.edit(other.id, post_id, draft).await;
    assert!(matches!(result, Err(PostError::NotAuthor { .. })));
    assert_eq!(store.post_text(post_id).await.as_deref(), Some("original"));
}

#[tokio::test]
async fn post_form_rejects_blank_text_and_unknown_group() {
    let store = MemoryStore::new();
    let author = store.add_user("author").await;
    let posts = post_service(&store);

    let draft = PostDraft {
        text: "   ".into(),
        group_id: Some(404),
        ..PostDraft::default()
    };
    match posts.create(&author, draft).await {
        Err(PostError::Invalid(errors)) => {
            assert!(errors.has("text"));
            assert!(errors.has("group"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn signup_opens_a_session_for_the_new_user() {
    let store = MemoryStore::new();
    let accounts = account_service(&store);

    let session = accounts
        .signup(signup_draft("leo", "war-and-peace", "war-and-peace"))
        .await
        .expect("signed up");
    assert_eq!(session.user.username, "leo");

    let viewer = accounts
        .authenticate(&session.token)
        .await
        .expect("authenticate")
        .expect("session resolves");
    assert_eq!(viewer.id, session.user.id);
}

#[tokio::test]
async fn signup_rejects_taken_usernames_and_bad_passwords() {
    let store = MemoryStore::new();
    store.add_user("leo").await;
    let accounts = account_service(&store);

    let Err(AccountError::Invalid(errors)) = accounts
        .signup(signup_draft("leo", "war-and-peace", "war-and-peace"))
        .await
    else {
        panic!("duplicate username accepted");
    };
    assert_eq!(errors.for_field("username"), [DUPLICATE_USERNAME_MESSAGE]);

    let Err(AccountError::Invalid(errors)) = accounts
        .signup(signup_draft("anna", "war-and-peace", "anna-karenina"))
        .await
    else {
        panic!("mismatched passwords accepted");
    };
    assert!(errors.has("password2"));
    assert!(!errors.has("password1"));

    let Err(AccountError::Invalid(errors)) =
        accounts.signup(signup_draft("anna", "short", "short")).await
    else {
        panic!("short password accepted");
    };
    assert!(errors.has("password1"));

    assert_eq!(store.session_count().await, 0);
}

#[tokio::test]
async fn login_requires_the_right_password() {
    let store = MemoryStore::new();
    store.add_user_with_password("leo", "war-and-peace").await;
    let accounts = account_service(&store);

    assert!(matches!(
        accounts.login("leo", "anna-karenina").await,
        Err(AccountError::InvalidCredentials)
    ));
    assert!(matches!(
        accounts.login("nobody", "war-and-peace").await,
        Err(AccountError::InvalidCredentials)
    ));
    assert_eq!(store.session_count().await, 0);

    let session = accounts.login(" leo ", "war-and-peace").await.expect("login");
    assert_eq!(session.user.username, "leo");
    assert_eq!(store.session_count().await, 1);
}

#[tokio::test]
async fn expired_sessions_are_dropped_on_use() {
    let store = MemoryStore::new();
    let user = store.add_user("leo").await;
    let token = store.open_session(&user).await;
    let accounts = account_service(&store);

    assert!(accounts.authenticate(&token).await.expect("authenticate").is_some());

    store.expire_sessions().await;
    assert!(accounts.authenticate(&token).await.expect("authenticate").is_none());
    assert_eq!(store.session_count().await, 0);
}

#[tokio::test]
async fn tampered_secrets_do_not_authenticate() {
    let store = MemoryStore::new();
    let user = store.add_user("leo").await;
    let token = store.open_session(&user).await;
    let accounts = account_service(&store);

    let (id, secret) = token.split_once('.').expect("token shape");
    let flipped = if secret.starts_with('0') { "1" } else { "0" };
    let tampered = format!("{id}.{flipped}{}", &secret[1..]);

    assert!(accounts.authenticate(&tampered).await.expect("authenticate").is_none());
    assert!(accounts.authenticate(&format!("{id}.")).await.expect("authenticate").is_none());
    // a bad secret must not revoke the real session
    assert_eq!(store.session_count().await, 1);
    assert!(accounts.authenticate(&token).await.expect("authenticate").is_some());
}

#[tokio::test]
async fn group_slugs_are_validated_and_unique() {
    let store = MemoryStore::new();
    let groups = group_service(&store);

    let created = groups
        .create("rustaceans", "Rustaceans", "crabs")
        .await
        .expect("created");
    assert_eq!(created.slug, "rustaceans");

    let duplicate = groups
        .create("rustaceans", "Other crabs", "")
        .await
        .expect_err("duplicate slug");
    assert!(matches!(duplicate, GroupError::DuplicateSlug { ref slug } if slug == "rustaceans"));

    let invalid = groups
        .create("Rust Aceans!", "Rustaceans", "")
        .await
        .expect_err("invalid slug");
    assert!(matches!(
        invalid,
        GroupError::Domain(DomainError::NotASlug { ref suggestion, .. }) if suggestion == "rust-aceans"
    ));

    let listed = groups.list().await.expect("list");
    assert_eq!(listed.len(), 1);
}
