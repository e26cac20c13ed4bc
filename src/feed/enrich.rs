//! Enrichment: joining a raw comment with its author's display profile.

use crate::feed::ProfileDirectory;
use crate::storage::{Profile, RawComment};
use std::sync::Arc;
use uuid::Uuid;

/// A view-ready comment: the raw author reference is dropped and replaced
/// with the resolved profile.
///
/// `profile: None` means the author was absent from the directory at
/// enrichment time. That is a valid terminal state, not an error, and it
/// never changes afterwards (the directory is frozen for the session).
#[derive(Debug, Clone)]
pub struct EnrichedComment {
    pub id: i64,
    pub video_id: Uuid,
    pub body: Arc<str>,
    pub created_at: i64,
    pub profile: Option<Profile>,
}

/// Join one raw comment with the directory. Pure: the same comment and
/// the same (frozen) directory always yield the same result.
pub fn enrich(raw: RawComment, directory: &ProfileDirectory) -> EnrichedComment {
    let profile = directory.lookup(&raw.author_username);
    EnrichedComment {
        id: raw.id,
        video_id: raw.video_id,
        body: raw.body,
        created_at: raw.created_at,
        profile,
    }
}
