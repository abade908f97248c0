use std::sync::Arc;

use heron::error::FeedError;
use heron::friends::FriendshipStatus;
use heron::reactions::ReactionToggle;
use heron::store::MemoryStore;
use heron::sync::SyncEngine;
use heron::users::{NewUser, Role, User};

fn engine() -> SyncEngine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    SyncEngine::new(Arc::new(MemoryStore::new()))
}

async fn register(engine: &SyncEngine, email: &str, username: &str) -> User {
    engine
        .register(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password: "hunter22".to_string(),
        })
        .await
        .expect("registration should succeed")
}

async fn login(engine: &SyncEngine, email: &str) {
    engine
        .login(email, "hunter22")
        .await
        .expect("login should succeed");
}

#[tokio::test]
async fn friend_request_round_trip() {
    let engine = engine();
    let ana = register(&engine, "ana@example.com", "ana").await;
    let bo = register(&engine, "bo@example.com", "bo").await;

    // Ana sends the request
    login(&engine, "ana@example.com").await;
    engine.send_friend_request(&bo.id).await.unwrap();
    assert_eq!(
        engine.friends().status(&ana.id, &bo.id).await.unwrap(),
        FriendshipStatus::Requested
    );

    // Bo sees exactly one request on the feed, then accepts it
    login(&engine, "bo@example.com").await;
    let feed = engine.load_feed().await.unwrap();
    assert_eq!(feed.friend_requests.len(), 1);
    assert_eq!(feed.friend_requests[0].from_username, "ana");

    engine.accept_friend_request(&ana.id).await.unwrap();

    let feed = engine.load_feed().await.unwrap();
    assert!(feed.friend_requests.is_empty());

    // The friendship is symmetric
    let friends_of_ana = engine.friends().friends_of(&ana.id).await.unwrap();
    let friends_of_bo = engine.friends().friends_of(&bo.id).await.unwrap();
    assert_eq!(friends_of_ana.len(), 1);
    assert_eq!(friends_of_bo.len(), 1);
    assert_eq!(friends_of_ana[0].id, bo.id);
    assert_eq!(friends_of_bo[0].id, ana.id);
    assert_eq!(
        engine.friends().status(&bo.id, &ana.id).await.unwrap(),
        FriendshipStatus::Friends
    );
}

#[tokio::test]
async fn declined_request_leaves_no_trace() {
    let engine = engine();
    let ana = register(&engine, "ana@example.com", "ana").await;
    let bo = register(&engine, "bo@example.com", "bo").await;

    login(&engine, "ana@example.com").await;
    engine.send_friend_request(&bo.id).await.unwrap();

    login(&engine, "bo@example.com").await;
    engine.decline_friend_request(&ana.id).await.unwrap();

    assert!(engine.load_feed().await.unwrap().friend_requests.is_empty());
    assert_eq!(
        engine.friends().status(&ana.id, &bo.id).await.unwrap(),
        FriendshipStatus::None
    );

    // Ana may ask again after a decline
    login(&engine, "ana@example.com").await;
    engine.send_friend_request(&bo.id).await.unwrap();
}

#[tokio::test]
async fn feed_load_repairs_stale_author_fields() {
    let engine = engine();
    let mut ana = register(&engine, "ana@example.com", "ana").await;
    login(&engine, "ana@example.com").await;

    let post = engine
        .create_post(Some("first!".into()), vec![])
        .await
        .unwrap();
    assert_eq!(post.author_name, "ana");

    // Rename after posting: the stored post still carries the old name
    ana.username = "ana_renamed".to_string();
    ana.avatar_url = Some("file:///ana.png".to_string());
    engine.update_user_profile(&ana).await.unwrap();
    let stored = engine.posts().get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.author_name, "ana");

    // One feed load converges the persisted document
    let feed = engine.load_feed().await.unwrap();
    assert_eq!(feed.posts[0].post.author_name, "ana_renamed");

    let repaired = engine.posts().get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(repaired.author_name, "ana_renamed");
    assert_eq!(repaired.author_avatar.as_deref(), Some("file:///ana.png"));

    // The session summary was refreshed on the same load
    assert_eq!(feed.viewer.unwrap().username, "ana_renamed");
}

#[tokio::test]
async fn comment_authors_are_repaired_too() {
    let engine = engine();
    register(&engine, "ana@example.com", "ana").await;
    let mut bo = register(&engine, "bo@example.com", "bo").await;

    login(&engine, "ana@example.com").await;
    let post = engine.create_post(Some("hi".into()), vec![]).await.unwrap();

    login(&engine, "bo@example.com").await;
    engine.add_comment(&post.id, "hello ana").await.unwrap();

    bo.username = "bo_renamed".to_string();
    engine.update_user_profile(&bo).await.unwrap();

    let feed = engine.load_feed().await.unwrap();
    assert_eq!(feed.posts[0].post.comments[0].author_name, "bo_renamed");
}

#[tokio::test]
async fn reaction_toggle_cycle_through_the_engine() {
    let engine = engine();
    register(&engine, "ana@example.com", "ana").await;
    register(&engine, "bo@example.com", "bo").await;

    login(&engine, "ana@example.com").await;
    let post = engine.create_post(Some("hi".into()), vec![]).await.unwrap();
    assert_eq!(
        engine.toggle_reaction(&post.id, "🔥").await.unwrap(),
        ReactionToggle::Added
    );

    login(&engine, "bo@example.com").await;
    assert_eq!(
        engine.toggle_reaction(&post.id, "🔥").await.unwrap(),
        ReactionToggle::Added
    );
    // Same user, different emoji: overwrite, not a second reaction
    assert_eq!(
        engine.toggle_reaction(&post.id, "😂").await.unwrap(),
        ReactionToggle::Changed
    );

    let feed = engine.load_feed().await.unwrap();
    assert_eq!(
        feed.posts[0].reactions,
        vec![("🔥".to_string(), 1), ("😂".to_string(), 1)]
    );

    // Same emoji again removes it
    assert_eq!(
        engine.toggle_reaction(&post.id, "😂").await.unwrap(),
        ReactionToggle::Removed
    );
    let feed = engine.load_feed().await.unwrap();
    assert_eq!(feed.posts[0].reactions, vec![("🔥".to_string(), 1)]);
}

#[tokio::test]
async fn only_admins_delete_posts() {
    let engine = engine();
    let ana = register(&engine, "ana@example.com", "ana").await;
    register(&engine, "bo@example.com", "bo").await;

    login(&engine, "ana@example.com").await;
    let post = engine.create_post(Some("hi".into()), vec![]).await.unwrap();

    // Regular users cannot delete, not even their own posts
    let result = engine.delete_post(&post.id).await;
    assert!(matches!(result, Err(FeedError::NotAuthorized)));

    let mut ana_admin = ana.clone();
    ana_admin.role = Role::Admin;
    engine.update_user_profile(&ana_admin).await.unwrap();

    engine.delete_post(&post.id).await.unwrap();
    assert!(engine.posts().get_post(&post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn new_posts_are_prepended() {
    let engine = engine();
    register(&engine, "ana@example.com", "ana").await;
    login(&engine, "ana@example.com").await;

    engine.create_post(Some("first".into()), vec![]).await.unwrap();
    engine.create_post(Some("second".into()), vec![]).await.unwrap();

    let feed = engine.load_feed().await.unwrap();
    assert_eq!(feed.posts[0].post.text.as_deref(), Some("second"));
    assert_eq!(feed.posts[1].post.text.as_deref(), Some("first"));
}

#[tokio::test]
async fn profile_edit_propagates_to_friend_lists() {
    let engine = engine();
    let mut ana = register(&engine, "ana@example.com", "ana").await;
    let bo = register(&engine, "bo@example.com", "bo").await;

    login(&engine, "ana@example.com").await;
    engine.send_friend_request(&bo.id).await.unwrap();
    login(&engine, "bo@example.com").await;
    engine.accept_friend_request(&ana.id).await.unwrap();

    ana.username = "ana_renamed".to_string();
    engine.update_user_profile(&ana).await.unwrap();

    let profile = engine.load_profile(&bo.id, None).await.unwrap();
    let entry = profile.friends.iter().find(|f| f.id == ana.id).unwrap();
    assert_eq!(entry.username, "ana_renamed");
}

#[tokio::test]
async fn logged_out_feed_has_no_viewer_and_no_requests() {
    let engine = engine();
    register(&engine, "ana@example.com", "ana").await;
    login(&engine, "ana@example.com").await;
    engine.create_post(Some("hi".into()), vec![]).await.unwrap();
    engine.logout().await.unwrap();

    let feed = engine.load_feed().await.unwrap();
    assert!(feed.viewer.is_none());
    assert_eq!(feed.posts.len(), 1);
    assert!(feed.friend_requests.is_empty());

    // Mutations require a session
    let result = engine.create_post(Some("nope".into()), vec![]).await;
    assert!(matches!(result, Err(FeedError::NotAuthorized)));
}
