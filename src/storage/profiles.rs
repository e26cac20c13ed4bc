//! Profile directory persistence.
//!
//! Usernames are the stable key: comments reference their author by
//! username, so re-registering an existing username only refreshes the
//! avatar and keeps the row (and id) intact.

use crate::storage::types::ProfileRow;
use crate::storage::{Database, Profile, StoreError};

impl Database {
    /// Create a profile, or refresh the avatar of an existing one.
    ///
    /// Returns the profile id (stable across re-registration).
    pub async fn create_profile(
        &self,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO profiles (username, avatar_url)
            VALUES (?, ?)
            ON CONFLICT(username) DO UPDATE SET
                avatar_url = excluded.avatar_url
            RETURNING id
        "#,
        )
        .bind(username)
        .bind(avatar_url)
        .fetch_one(self.pool())
        .await
        .map_err(StoreError::from_sqlx)?;

        tracing::debug!(username, id = row.0, "Profile registered");
        Ok(row.0)
    }

    /// Full directory snapshot: every known profile.
    pub async fn fetch_all_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let rows: Vec<ProfileRow> =
            sqlx::query_as("SELECT username, avatar_url FROM profiles ORDER BY username")
                .fetch_all(self.pool())
                .await
                .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(ProfileRow::into_profile).collect())
    }

    /// Look up a profile id by username (CLI convenience).
    pub async fn profile_id(&self, username: &str) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM profiles WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(row.map(|(id,)| id))
    }
}
