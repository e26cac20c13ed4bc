//! Integration tests for a full feed session: concurrent history and
//! directory load, enrichment, submission, and live application.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use pretty_assertions::assert_eq;
use sidechat::feed::{CommentFeed, FeedConfig, FeedError, FeedState, SubmitOutcome};
use sidechat::live::RowEvent;
use sidechat::storage::{Database, StoreError};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

async fn open_feed(db: &Database, video: Uuid) -> CommentFeed {
    CommentFeed::open(db.clone(), video, FeedConfig::default()).await
}

/// Wait for the next list change, with a timeout so a lost delivery
/// fails the test instead of hanging it.
async fn next_update(rx: &mut watch::Receiver<FeedState>) -> FeedState {
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("timed out waiting for a feed update")
        .expect("feed state dropped");
    rx.borrow_and_update().clone()
}

#[tokio::test]
async fn test_history_is_enriched_and_isolated_per_video() {
    let db = test_db().await;
    let video = Uuid::new_v4();
    let other = Uuid::new_v4();

    let ann = db
        .create_profile("ann", Some("https://cdn.example/ann.png"))
        .await
        .unwrap();
    let bob = db.create_profile("bob", None).await.unwrap();

    db.insert_comment(video, "first", ann).await.unwrap();
    db.insert_comment(video, "second", bob).await.unwrap();
    db.insert_comment(other, "elsewhere", ann).await.unwrap();

    let feed = open_feed(&db, video).await;
    let list = feed.comments();

    assert_eq!(list.len(), 2);

    // Newest first: timestamps never increase down the list
    for pair in list.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }

    let first = list.iter().find(|c| &*c.body == "first").unwrap();
    let profile = first.profile.as_ref().expect("ann should be resolved");
    assert_eq!(profile.username, "ann");
    assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn.example/ann.png"));

    let second = list.iter().find(|c| &*c.body == "second").unwrap();
    let profile = second.profile.as_ref().expect("bob should be resolved");
    assert_eq!(profile.username, "bob");
    assert_eq!(profile.avatar_url, None);

    assert!(list.iter().all(|c| c.video_id == video));
}

#[tokio::test]
async fn test_empty_history_yields_empty_feed() {
    let db = test_db().await;
    let feed = open_feed(&db, Uuid::new_v4()).await;

    assert!(feed.is_empty());
    assert_eq!(feed.len(), 0);
}

#[tokio::test]
async fn test_submit_round_trip_appears_exactly_once() {
    let db = test_db().await;
    let video = Uuid::new_v4();
    let ann = db.create_profile("ann", None).await.unwrap();

    let feed = open_feed(&db, video).await;
    let mut updates = feed.subscribe_updates();

    let outcome = feed.submit("hello there", ann).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Posted);

    // The comment comes back through the live channel, not a local insert
    let list = next_update(&mut updates).await;
    assert_eq!(list.len(), 1);
    assert_eq!(&*list[0].body, "hello there");
    assert_eq!(
        list[0].profile.as_ref().map(|p| p.username.as_str()),
        Some("ann")
    );

    assert_eq!(db.comment_count(video).await.unwrap(), 1);
    assert_eq!(feed.len(), 1);
}

#[tokio::test]
async fn test_duplicate_live_event_applied_once() {
    let db = test_db().await;
    let video = Uuid::new_v4();
    let ann = db.create_profile("ann", None).await.unwrap();

    let feed = open_feed(&db, video).await;
    let mut updates = feed.subscribe_updates();

    feed.submit("original", ann).await.unwrap();
    let list = next_update(&mut updates).await;
    let first_id = list[0].id;

    // Replay the insert notification, then post a second comment. The
    // pump handles deliveries in order, so once "after" shows up the
    // duplicate has already been considered.
    db.bus().publish(RowEvent::comment_insert(video, first_id));
    feed.submit("after", ann).await.unwrap();

    let list = next_update(&mut updates).await;
    let final_list = if list.len() == 2 {
        list
    } else {
        next_update(&mut updates).await
    };

    assert_eq!(final_list.len(), 2);
    assert_eq!(&*final_list[0].body, "after");
    assert_eq!(&*final_list[1].body, "original");
}

#[tokio::test]
async fn test_live_insert_prepends_newest_first() {
    let db = test_db().await;
    let video = Uuid::new_v4();
    let ann = db.create_profile("ann", None).await.unwrap();

    db.insert_comment(video, "from history", ann).await.unwrap();

    let feed = open_feed(&db, video).await;
    assert_eq!(feed.len(), 1);

    let mut updates = feed.subscribe_updates();
    db.insert_comment(video, "live one", ann).await.unwrap();

    let list = next_update(&mut updates).await;
    assert_eq!(list.len(), 2);
    assert_eq!(&*list[0].body, "live one");
    assert_eq!(&*list[1].body, "from history");
}

#[tokio::test]
async fn test_whitespace_submit_is_a_silent_no_op() {
    let db = test_db().await;
    let video = Uuid::new_v4();
    let ann = db.create_profile("ann", None).await.unwrap();

    let feed = open_feed(&db, video).await;

    assert_eq!(feed.submit("", ann).await.unwrap(), SubmitOutcome::Ignored);
    assert_eq!(
        feed.submit("   \n\t ", ann).await.unwrap(),
        SubmitOutcome::Ignored
    );

    // Nothing reached the store
    assert_eq!(db.comment_count(video).await.unwrap(), 0);
    assert!(feed.is_empty());
}

#[tokio::test]
async fn test_submit_trims_surrounding_whitespace() {
    let db = test_db().await;
    let video = Uuid::new_v4();
    let ann = db.create_profile("ann", None).await.unwrap();

    let feed = open_feed(&db, video).await;
    let mut updates = feed.subscribe_updates();

    feed.submit("  trimmed  ", ann).await.unwrap();
    let list = next_update(&mut updates).await;
    assert_eq!(&*list[0].body, "trimmed");
}

#[tokio::test]
async fn test_submit_with_unknown_author_fails_and_list_is_unchanged() {
    let db = test_db().await;
    let video = Uuid::new_v4();

    let feed = open_feed(&db, video).await;
    let err = feed.submit("ghost comment", 404).await.unwrap_err();

    assert!(matches!(
        err,
        FeedError::Store(StoreError::UnknownAuthor(404))
    ));
    assert_eq!(db.comment_count(video).await.unwrap(), 0);
    assert!(feed.is_empty());
}

#[tokio::test]
async fn test_comment_from_unregistered_author_renders_without_profile() {
    let db = test_db().await;
    let video = Uuid::new_v4();
    let ann = db.create_profile("ann", None).await.unwrap();

    let feed = open_feed(&db, video).await;
    let mut updates = feed.subscribe_updates();

    // Registered after the feed's directory snapshot was taken, so the
    // session never learns about this author.
    let late = db.create_profile("latecomer", None).await.unwrap();
    db.insert_comment(video, "who am I", late).await.unwrap();

    let list = next_update(&mut updates).await;
    assert_eq!(list.len(), 1);
    assert!(list[0].profile.is_none());

    // A known author still resolves on the same open feed
    db.insert_comment(video, "known", ann).await.unwrap();
    let list = next_update(&mut updates).await;
    assert_eq!(
        list[0].profile.as_ref().map(|p| p.username.as_str()),
        Some("ann")
    );
}
