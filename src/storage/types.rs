use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Store-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process has locked the comment store
    #[error("Another process is holding the comment store open. Close it and try again.")]
    Locked,

    /// Insert referenced a profile id that does not exist
    #[error("No profile with id {0}")]
    UnknownAuthor(i64),

    /// Generic database error
    #[error("Store error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StoreError::Locked;
        }

        StoreError::Other(err)
    }

    /// Classify an insert failure: a foreign key violation on `author_id`
    /// means the referenced profile does not exist.
    pub(crate) fn from_insert(err: sqlx::Error, author_id: i64) -> Self {
        if err
            .to_string()
            .to_lowercase()
            .contains("foreign key constraint failed")
        {
            return StoreError::UnknownAuthor(author_id);
        }
        StoreError::from_sqlx(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A user's display profile from the directory.
///
/// `username` is the unique key. Comments reference their author by
/// username, so a username must never change once the profile exists.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Profile {
    pub username: String,
    pub avatar_url: Option<String>,
}

/// A comment as stored, tagged with its author's username.
///
/// `body` uses `Arc<str>` for cheap cloning into feed snapshots.
#[derive(Debug, Clone)]
pub struct RawComment {
    pub id: i64,
    pub video_id: Uuid,
    pub body: Arc<str>,
    /// Epoch milliseconds (UTC), assigned by the store at insert time.
    pub created_at: i64,
    pub author_username: String,
}

/// Internal row type for comment queries (used by sqlx FromRow).
/// Converts to RawComment via into_comment() with Arc wrapping.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub id: i64,
    pub video_id: Uuid,
    pub body: String,
    pub created_at: i64,
    pub author_username: String,
}

impl CommentRow {
    pub(crate) fn into_comment(self) -> RawComment {
        RawComment {
            id: self.id,
            video_id: self.video_id,
            body: Arc::from(self.body),
            created_at: self.created_at,
            author_username: self.author_username,
        }
    }
}

/// Internal row type for profile queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProfileRow {
    pub username: String,
    pub avatar_url: Option<String>,
}

impl ProfileRow {
    pub(crate) fn into_profile(self) -> Profile {
        Profile {
            username: self.username,
            avatar_url: self.avatar_url,
        }
    }
}
