//! The comment feed orchestrator.
//!
//! A feed session joins two independent loads (profile directory and
//! comment history) before any comment becomes visible, then keeps the
//! list current by applying live inserts delivered through the per-video
//! channel. Submissions are never inserted locally: the author's own
//! comment comes back through the same channel as everyone else's, which
//! is what guarantees it appears exactly once.

mod directory;
mod enrich;
mod typing;

pub use directory::ProfileDirectory;
pub use enrich::{enrich, EnrichedComment};
pub use typing::{TypingSignal, DEFAULT_DEBOUNCE};

use crate::live::{ChannelStatus, LiveSubscription};
use crate::storage::{Database, StoreError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

// ============================================================================
// Configuration and Errors
// ============================================================================

/// Tuning for one feed session.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Quiet window for the typing signal.
    pub typing_debounce: Duration,
    /// Buffer for live deliveries awaiting application to the list.
    pub live_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            typing_debounce: DEFAULT_DEBOUNCE,
            live_buffer: 64,
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed was torn down; no further mutation is accepted.
    #[error("Feed is closed")]
    Closed,

    /// The submit write failed at the store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The comment was written; it will arrive via the live channel.
    Posted,
    /// Empty or whitespace-only text: silently skipped, no network call.
    Ignored,
}

// ============================================================================
// Feed State Helpers
// ============================================================================

/// Snapshot of the list, newest first. Shared by value between the feed
/// and its observers.
pub type FeedState = Arc<Vec<EnrichedComment>>;

/// Prepend a live comment unless its id is already present.
///
/// Returns the new list on insertion, `None` for a duplicate. Pure so the
/// dedup invariant can be tested without a running feed.
fn insert_newest(
    list: &FeedState,
    seen: &mut HashSet<i64>,
    comment: EnrichedComment,
) -> Option<FeedState> {
    if !seen.insert(comment.id) {
        return None;
    }
    let mut next = Vec::with_capacity(list.len() + 1);
    next.push(comment);
    next.extend_from_slice(list);
    Some(Arc::new(next))
}

// ============================================================================
// Comment Feed
// ============================================================================

/// One open discussion feed for one video.
///
/// State machine: `open()` resolves in Ready (history enriched, live
/// subscription established); live deliveries and submissions keep it in
/// Ready; `close()` moves it to Closed (channel released, no further
/// mutation). Dropping the feed mid-`open()` cancels the in-flight loads;
/// dropping a ready feed aborts its tasks as a backstop for a missed
/// `close()`.
pub struct CommentFeed {
    db: Database,
    video_id: Uuid,
    directory: ProfileDirectory,
    state: Arc<watch::Sender<FeedState>>,
    subscription: LiveSubscription,
    pump: Option<JoinHandle<()>>,
    typing: TypingSignal,
    closed: AtomicBool,
}

impl CommentFeed {
    /// Open a feed session for `video_id`.
    ///
    /// The live channel is registered before anything is fetched, so an
    /// insert landing during initialization is buffered rather than
    /// lost. The directory and history loads run concurrently and both
    /// must finish before the initial list is published; a failed load
    /// degrades (empty directory, empty history) instead of erroring.
    pub async fn open(db: Database, video_id: Uuid, config: FeedConfig) -> CommentFeed {
        let directory = ProfileDirectory::new();
        let (delivery_tx, delivery_rx) = mpsc::channel(config.live_buffer.max(1));
        let subscription =
            LiveSubscription::open(db.clone(), directory.clone(), video_id, delivery_tx);

        let (_, history) = tokio::join!(directory.load(&db), async {
            match db.fetch_comments(video_id).await {
                Ok(comments) => comments,
                Err(e) => {
                    tracing::warn!(
                        video = %video_id,
                        error = %e,
                        "Comment history load failed; showing an empty feed"
                    );
                    Vec::new()
                }
            }
        });

        let mut seen: HashSet<i64> = HashSet::with_capacity(history.len());
        let enriched: Vec<EnrichedComment> = history
            .into_iter()
            .filter(|c| seen.insert(c.id))
            .map(|c| enrich(c, &directory))
            .collect();

        tracing::debug!(video = %video_id, comments = enriched.len(), "Comment feed ready");

        let (state_tx, _) = watch::channel(Arc::new(enriched));
        let state = Arc::new(state_tx);
        let pump = tokio::spawn(pump_deliveries(delivery_rx, Arc::clone(&state), seen));

        CommentFeed {
            db,
            video_id,
            directory,
            state,
            subscription,
            pump: Some(pump),
            typing: TypingSignal::new(config.typing_debounce),
            closed: AtomicBool::new(false),
        }
    }

    pub fn video_id(&self) -> Uuid {
        self.video_id
    }

    /// Snapshot of the current list, newest first. Cheap (Arc clone).
    pub fn comments(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Number of comments currently in the feed.
    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Observe list changes. Each update carries the whole list snapshot;
    /// viewers render from it directly.
    pub fn subscribe_updates(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// The session's profile directory (frozen after load).
    pub fn directory(&self) -> &ProfileDirectory {
        &self.directory
    }

    /// Connection status of the live channel.
    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.subscription.status()
    }

    /// The feed's composing signal; forward input keystrokes here.
    pub fn typing(&self) -> &TypingSignal {
        &self.typing
    }

    /// Post a comment.
    ///
    /// Whitespace-only text is a silent no-op (no network call). On
    /// success nothing is inserted locally: the comment arrives through
    /// the live channel, so the feed never holds two copies of it. Store
    /// failures surface to the caller; the list is unaffected either way.
    pub async fn submit(&self, text: &str, author_id: i64) -> Result<SubmitOutcome, FeedError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FeedError::Closed);
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        self.db
            .insert_comment(self.video_id, trimmed, author_id)
            .await?;
        Ok(SubmitOutcome::Posted)
    }

    /// Tear the feed down: release the live channel, stop applying
    /// deliveries (buffered ones are dropped), clear the typing timer.
    /// Idempotent. After this returns the list can no longer change.
    pub async fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.subscription.unsubscribe().await;
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let _ = pump.await;
        }
        self.typing.clear();
        tracing::debug!(video = %self.video_id, "Comment feed closed");
    }
}

/// Abort the delivery pump if `close()` was never called. The
/// subscription aborts its own task in its `Drop`.
impl Drop for CommentFeed {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            tracing::debug!(video = %self.video_id, "Aborted feed pump on drop");
        }
    }
}

/// Apply live deliveries to the list in arrival order, dropping
/// duplicates of ids already present (history or earlier delivery).
async fn pump_deliveries(
    mut deliveries: mpsc::Receiver<EnrichedComment>,
    state: Arc<watch::Sender<FeedState>>,
    mut seen: HashSet<i64>,
) {
    while let Some(comment) = deliveries.recv().await {
        let id = comment.id;
        let mut inserted = false;
        state.send_if_modified(|list| {
            match insert_newest(list, &mut seen, comment) {
                Some(next) => {
                    *list = next;
                    inserted = true;
                    true
                }
                None => false,
            }
        });
        if !inserted {
            tracing::debug!(comment = id, "Duplicate live insert dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn comment(id: i64) -> EnrichedComment {
        EnrichedComment {
            id,
            video_id: Uuid::nil(),
            body: Arc::from("x"),
            created_at: id,
            profile: None,
        }
    }

    #[test]
    fn test_insert_newest_prepends() {
        let list: FeedState = Arc::new(vec![comment(1)]);
        let mut seen: HashSet<i64> = [1].into_iter().collect();

        let next = insert_newest(&list, &mut seen, comment(2)).unwrap();
        assert_eq!(next[0].id, 2);
        assert_eq!(next[1].id, 1);
    }

    #[test]
    fn test_insert_newest_drops_duplicate() {
        let list: FeedState = Arc::new(vec![comment(1)]);
        let mut seen: HashSet<i64> = [1].into_iter().collect();

        assert!(insert_newest(&list, &mut seen, comment(1)).is_none());
    }

    #[tokio::test]
    async fn test_feed_opens_empty_when_history_load_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let ann = db.create_profile("ann", None).await.unwrap();
        let video = Uuid::new_v4();
        db.insert_comment(video, "unreachable", ann).await.unwrap();

        // Sever the store: the history fetch now errors and the feed must
        // degrade to an empty list instead of failing to open.
        db.pool().close().await;

        let feed = CommentFeed::open(db, video, FeedConfig::default()).await;
        assert!(feed.is_empty());
        assert_eq!(feed.len(), 0);
        assert!(feed.directory().is_loaded());
    }

    proptest! {
        /// Dedup invariant: after any interleaving of history ids and
        /// live ids (which may repeat and overlap history), every id
        /// appears exactly once and fresh live inserts sit at the front
        /// in reverse arrival order.
        #[test]
        fn prop_no_duplicate_ids(
            history in proptest::collection::hash_set(0i64..50, 0..20),
            live in proptest::collection::vec(0i64..50, 0..40),
        ) {
            let mut seen: HashSet<i64> = history.clone();
            let mut list: FeedState =
                Arc::new(history.iter().copied().map(comment).collect());

            let mut fresh_rev: Vec<i64> = Vec::new();
            for id in &live {
                if let Some(next) = insert_newest(&list, &mut seen, comment(*id)) {
                    list = next;
                    fresh_rev.insert(0, *id);
                }
            }

            // No duplicates anywhere in the final list
            let mut ids: Vec<i64> = list.iter().map(|c| c.id).collect();
            let total = ids.len();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), total);

            // Fresh inserts lead the list, newest arrival first
            let head: Vec<i64> = list.iter().take(fresh_rev.len()).map(|c| c.id).collect();
            prop_assert_eq!(head, fresh_rev);
        }
    }
}
