//! Per-video publish/subscribe channels for row-change notifications.
//!
//! A channel is keyed by the video id exactly, so feeds for different
//! videos never cross-deliver. Event payloads carry routing data only
//! (table, row id, video id); subscribers re-fetch the row for content
//! rather than trusting the push payload.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default buffer per channel. A lagging subscriber past this many
/// undelivered events starts losing the oldest ones (reported as a
/// channel error, never a panic).
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Table name carried on comment events.
pub const COMMENTS_TABLE: &str = "comments";

/// Kind of row change. The comment store only publishes inserts today;
/// subscribers must ignore kinds they do not handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

/// Routing reference to a changed row. Deliberately minimal: content is
/// re-fetched by id.
#[derive(Debug, Clone, Copy)]
pub struct RowRef {
    pub id: i64,
    pub video_id: Uuid,
}

/// A row-change notification as delivered on a channel.
#[derive(Debug, Clone)]
pub struct RowEvent {
    pub kind: EventKind,
    pub table: &'static str,
    pub row: RowRef,
}

impl RowEvent {
    /// Notification for a newly inserted comment.
    pub fn comment_insert(video_id: Uuid, id: i64) -> Self {
        Self {
            kind: EventKind::Insert,
            table: COMMENTS_TABLE,
            row: RowRef { id, video_id },
        }
    }
}

/// Registry of per-video broadcast channels.
///
/// Clone is cheap; all clones share the same registry. Channels are
/// created lazily on first subscribe and garbage-collected when a publish
/// finds no remaining receivers.
#[derive(Clone)]
pub struct LiveBus {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<RowEvent>>>>,
    capacity: usize,
}

impl Default for LiveBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl LiveBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to the logical channel for one video, creating it if
    /// needed. Events published after this call are buffered for the
    /// returned receiver even if it is not polled yet.
    pub fn open_channel(&self, video_id: Uuid) -> broadcast::Receiver<RowEvent> {
        let mut channels = self.channels.lock().expect("live bus lock poisoned");
        channels
            .entry(video_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to the channel matching its video id.
    ///
    /// Returns the number of receivers reached. Publishing to a video
    /// with no open channel (or no remaining receivers) is a no-op; the
    /// stale sender is garbage-collected.
    pub fn publish(&self, event: RowEvent) -> usize {
        let mut channels = self.channels.lock().expect("live bus lock poisoned");
        let video_id = event.row.video_id;
        match channels.get(&video_id) {
            Some(tx) => match tx.send(event) {
                Ok(reached) => reached,
                Err(_) => {
                    // Last receiver is gone; drop the channel entry.
                    channels.remove(&video_id);
                    0
                }
            },
            None => 0,
        }
    }

    /// Release a video's channel if nothing is subscribed anymore.
    /// Idempotent: closing an unknown or already-closed channel is a
    /// no-op.
    pub fn close_channel(&self, video_id: Uuid) {
        let mut channels = self.channels.lock().expect("live bus lock poisoned");
        if let Some(tx) = channels.get(&video_id) {
            if tx.receiver_count() == 0 {
                channels.remove(&video_id);
                tracing::debug!(video = %video_id, "Live channel released");
            }
        }
    }

    /// Number of open channels (diagnostics).
    pub fn channel_count(&self) -> usize {
        self.channels.lock().expect("live bus lock poisoned").len()
    }
}
