//! Comment persistence and the insert-notification hook.
//!
//! `insert_comment` deliberately returns no row: callers learn about the
//! new comment through the live channel like every other viewer, which is
//! what keeps a submitted comment from appearing twice in a feed.

use crate::live::RowEvent;
use crate::storage::types::CommentRow;
use crate::storage::{Database, RawComment, StoreError};
use chrono::Utc;
use uuid::Uuid;

impl Database {
    /// All comments for a video, newest first.
    ///
    /// Equal timestamps keep insertion order (ascending id) within the
    /// descending list. Returns an empty vec when the video has no
    /// comments.
    pub async fn fetch_comments(&self, video_id: Uuid) -> Result<Vec<RawComment>, StoreError> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.video_id, c.body, c.created_at, p.username AS author_username
            FROM comments c
            JOIN profiles p ON p.id = c.author_id
            WHERE c.video_id = ?
            ORDER BY c.created_at DESC, c.id ASC
        "#,
        )
        .bind(video_id)
        .fetch_all(self.pool())
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(CommentRow::into_comment).collect())
    }

    /// Fetch one comment by id, joined with its author's username.
    ///
    /// Used by the live subscriber to resolve full detail from a partial
    /// push payload. Returns `None` if the row is gone by the time the
    /// event is processed.
    pub async fn fetch_comment_by_id(
        &self,
        video_id: Uuid,
        id: i64,
    ) -> Result<Option<RawComment>, StoreError> {
        let row: Option<CommentRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.video_id, c.body, c.created_at, p.username AS author_username
            FROM comments c
            JOIN profiles p ON p.id = c.author_id
            WHERE c.video_id = ? AND c.id = ?
        "#,
        )
        .bind(video_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.map(CommentRow::into_comment))
    }

    /// Insert a new comment and announce it on the live bus.
    ///
    /// The inserted row is not returned; it reaches feeds only via the
    /// per-video channel. Fails with [`StoreError::UnknownAuthor`] when
    /// `author_id` references no profile.
    pub async fn insert_comment(
        &self,
        video_id: Uuid,
        body: &str,
        author_id: i64,
    ) -> Result<(), StoreError> {
        let created_at = Utc::now().timestamp_millis();

        let result = sqlx::query(
            "INSERT INTO comments (video_id, author_id, body, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(video_id)
        .bind(author_id)
        .bind(body)
        .bind(created_at)
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::from_insert(e, author_id))?;

        let id = result.last_insert_rowid();
        let reached = self.bus().publish(RowEvent::comment_insert(video_id, id));
        tracing::debug!(
            video = %video_id,
            comment = id,
            receivers = reached,
            "Comment inserted"
        );

        Ok(())
    }

    /// Number of comments stored for a video (tests and diagnostics).
    pub async fn comment_count(&self, video_id: Uuid) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(self.pool())
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(row.0)
    }
}
