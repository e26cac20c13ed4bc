use crate::live::LiveBus;
use crate::storage::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

// ============================================================================
// Database
// ============================================================================

/// Handle to the comment store: profiles and per-video comments.
///
/// Clone is cheap (pool and bus are both reference-counted). Every
/// successful comment insert is announced on the attached [`LiveBus`],
/// which is how open feeds learn about new rows without re-fetching
/// history.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    bus: LiveBus,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// Pass `":memory:"` for an in-memory store (tests).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))
            .map_err(StoreError::from_sqlx)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory SQLite database exists per connection; keep it on a
        // single connection so every query sees the same data.
        let max_connections = if path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;

        let db = Self {
            pool,
            bus: LiveBus::default(),
        };
        db.migrate().await?;
        Ok(db)
    }

    /// The live bus this store publishes insert notifications on.
    pub fn bus(&self) -> &LiveBus {
        &self.bus
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                avatar_url TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                video_id BLOB NOT NULL,
                author_id INTEGER NOT NULL REFERENCES profiles(id),
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
