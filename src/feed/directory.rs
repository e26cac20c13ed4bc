//! Session-scoped profile directory: loaded once, then frozen.
//!
//! Readiness is an explicit future the loader resolves; nothing polls for
//! the directory to appear.

use crate::storage::{Database, Profile, StoreError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

type Snapshot = Arc<HashMap<String, Profile>>;

struct Inner {
    profiles: watch::Sender<Option<Snapshot>>,
    load_started: AtomicBool,
}

/// Read-only lookup table of user profiles, keyed by username.
///
/// `load` is single-flight: concurrent callers share one underlying
/// fetch, and every caller observes the same resulting set. A failed
/// fetch freezes the directory empty rather than erroring; comments
/// whose author cannot be found degrade to `profile: None` downstream.
///
/// Clone is cheap; all clones share the same state.
#[derive(Clone)]
pub struct ProfileDirectory {
    inner: Arc<Inner>,
}

impl Default for ProfileDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileDirectory {
    pub fn new() -> Self {
        let (profiles, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                profiles,
                load_started: AtomicBool::new(false),
            }),
        }
    }

    /// Load the directory from the store. See [`load_with`](Self::load_with).
    pub async fn load(&self, db: &Database) -> Snapshot {
        self.load_with(|| db.fetch_all_profiles()).await
    }

    /// Load the directory via `fetch`, single-flight.
    ///
    /// The first caller performs the fetch; everyone else (concurrent or
    /// later) awaits and shares its result. A fetch error logs a warning
    /// and resolves the directory empty.
    ///
    /// Cancelling the first caller mid-fetch leaves the directory
    /// unresolved; callers own teardown in that case (an open feed being
    /// cancelled tears the whole session down anyway).
    pub async fn load_with<F, Fut>(&self, fetch: F) -> Snapshot
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Profile>, StoreError>>,
    {
        if self.inner.load_started.swap(true, Ordering::SeqCst) {
            return self.ready().await;
        }

        let map: HashMap<String, Profile> = match fetch().await {
            Ok(profiles) => profiles
                .into_iter()
                .map(|p| (p.username.clone(), p))
                .collect(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Profile directory load failed; comments will resolve without profiles"
                );
                HashMap::new()
            }
        };

        let snapshot: Snapshot = Arc::new(map);
        self.inner.profiles.send_replace(Some(Arc::clone(&snapshot)));
        tracing::debug!(profiles = snapshot.len(), "Profile directory loaded");
        snapshot
    }

    /// Resolve once the initial load has completed. Returns the frozen
    /// snapshot. Resolves immediately if the load is already done.
    pub async fn ready(&self) -> Snapshot {
        let mut rx = self.inner.profiles.subscribe();
        // Clone out of the watch guard before it drops; the guard borrows
        // the receiver and must not escape this scope.
        let snapshot = match rx.wait_for(|v| v.is_some()).await {
            Ok(guard) => guard.as_ref().map(Arc::clone),
            // Sender gone means the directory itself was dropped mid-wait;
            // resolve empty rather than hanging teardown.
            Err(_) => Some(Arc::new(HashMap::new())),
        };
        snapshot.expect("guarded by wait_for")
    }

    /// Pure lookup by username. Requires the load to have completed;
    /// before that every lookup misses (callers sequence via [`ready`](Self::ready)).
    pub fn lookup(&self, username: &str) -> Option<Profile> {
        self.inner
            .profiles
            .borrow()
            .as_ref()?
            .get(username)
            .cloned()
    }

    /// Whether the initial load has completed.
    pub fn is_loaded(&self) -> bool {
        self.inner.profiles.borrow().is_some()
    }
}
