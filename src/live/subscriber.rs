//! Live comment subscription: one spawned task per open feed that turns
//! insert notifications into enriched comments.
//!
//! The push payload is trusted for routing only; each event triggers a
//! re-fetch of the single comment by id before enrichment. Enrichment of
//! a live comment waits for the profile directory's initial load, so an
//! insert that outruns the directory is held, not resolved against a
//! partially loaded snapshot.

use crate::feed::{enrich, EnrichedComment, ProfileDirectory};
use crate::live::bus::{EventKind, LiveBus, COMMENTS_TABLE};
use crate::storage::Database;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Connection state of a live subscription, for observability. Status
/// never gates delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Open,
    Error,
}

/// Handle to an active per-video subscription.
///
/// Dropping the handle aborts the delivery task; prefer
/// [`unsubscribe`](Self::unsubscribe), which additionally waits for the
/// task to finish so no delivery can land afterwards.
pub struct LiveSubscription {
    video_id: Uuid,
    bus: LiveBus,
    task: Option<JoinHandle<()>>,
    status_rx: watch::Receiver<ChannelStatus>,
}

impl LiveSubscription {
    /// Open the video's channel and start delivering enriched comments
    /// into `delivery`.
    ///
    /// The broadcast receiver is registered before the task is spawned,
    /// so an insert happening between this call and the first poll is
    /// buffered, not lost.
    pub fn open(
        db: Database,
        directory: ProfileDirectory,
        video_id: Uuid,
        delivery: mpsc::Sender<EnrichedComment>,
    ) -> LiveSubscription {
        let mut events = db.bus().open_channel(video_id);
        let bus = db.bus().clone();
        let (status_tx, status_rx) = watch::channel(ChannelStatus::Connecting);

        let task = tokio::spawn(async move {
            status_tx.send_replace(ChannelStatus::Open);
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.kind != EventKind::Insert || event.table != COMMENTS_TABLE {
                            continue;
                        }
                        if event.row.video_id != video_id {
                            continue;
                        }

                        let raw = match db.fetch_comment_by_id(video_id, event.row.id).await {
                            Ok(Some(raw)) => raw,
                            Ok(None) => {
                                tracing::warn!(
                                    video = %video_id,
                                    comment = event.row.id,
                                    "Insert event for a row that no longer exists; dropping"
                                );
                                continue;
                            }
                            Err(e) => {
                                tracing::warn!(
                                    video = %video_id,
                                    comment = event.row.id,
                                    error = %e,
                                    "Failed to resolve inserted comment; dropping event"
                                );
                                continue;
                            }
                        };

                        // A live insert can outrun the directory's initial
                        // load; hold this one event until it resolves.
                        directory.ready().await;
                        let enriched = enrich(raw, &directory);

                        if delivery.send(enriched).await.is_err() {
                            tracing::debug!(
                                video = %video_id,
                                "Feed receiver dropped; stopping live subscription"
                            );
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            video = %video_id,
                            skipped,
                            "Live channel lagged; events were lost"
                        );
                        status_tx.send_replace(ChannelStatus::Error);
                    }
                    Err(RecvError::Closed) => {
                        status_tx.send_replace(ChannelStatus::Error);
                        break;
                    }
                }
            }
        });

        LiveSubscription {
            video_id,
            bus,
            task: Some(task),
            status_rx,
        }
    }

    /// Watch the connection status (connecting → open, error on channel
    /// trouble). The core does not auto-reconnect; transport owns retry.
    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }

    /// Stop the subscription. Idempotent. After this returns, the
    /// delivery task has fully terminated: no further comment can be
    /// handed to the feed, even one already buffered on the channel.
    pub async fn unsubscribe(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
            let _ = handle.await;
            self.bus.close_channel(self.video_id);
            tracing::debug!(video = %self.video_id, "Live subscription closed");
        }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
            tracing::debug!(video = %self.video_id, "Aborted live subscription on drop");
        }
    }
}
