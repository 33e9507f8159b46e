//! The progress store: every user's playlists and playback state, mirrored
//! from the object store and guarded by one store-wide lock.
//!
//! The same [`ProgressStore`] handle is shared by the HTTP handlers, the
//! refresh loop and the save loop. Lock sections never span a network call:
//! remote probes, listings and presigning run before or after the locked
//! section and their results are applied in one step.

mod model;
mod progress;
mod reconcile;
mod refresh;
mod snapshot;

pub use model::{Playlist, User, Video};
pub use progress::{CurrentVideo, NextUp, PlaylistSummary};
pub use reconcile::ReconcileReport;
pub use refresh::RefreshReport;
pub use snapshot::{LoadOutcome, SaveOutcome};

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::storage::ObjectStore;
use model::StoreState;

/// Well-known key the snapshot is stored under.
pub const DEFAULT_SNAPSHOT_KEY: &str = ".cueline-db.json";

#[derive(Clone)]
pub struct ProgressStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: Mutex<StoreState>,
    objects: Arc<dyn ObjectStore>,
    snapshot_key: String,
    /// Serializes whole refresh passes against each other.
    refresh_gate: Mutex<()>,
    /// Serializes snapshot writes against each other.
    save_gate: Mutex<()>,
}

impl fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressStore")
            .field("snapshot_key", &self.inner.snapshot_key)
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    pub fn new(objects: Arc<dyn ObjectStore>, snapshot_key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                objects,
                snapshot_key: snapshot_key.into(),
                refresh_gate: Mutex::new(()),
                save_gate: Mutex::new(()),
            }),
        }
    }

    /// Whether any mutation has happened since the last successful save.
    pub async fn is_dirty(&self) -> bool {
        self.inner.state.lock().await.is_dirty()
    }

    /// Clone of one playlist, mainly for inspection in tests and tooling.
    pub async fn playlist(&self, user: &str, playlist: &str) -> Option<Playlist> {
        let state = self.inner.state.lock().await;
        state
            .users
            .get(user)
            .and_then(|u| u.playlists.get(playlist))
            .cloned()
    }

    pub async fn video(
        &self,
        user: &str,
        playlist: &str,
        video_id: &str,
    ) -> Option<Video> {
        let state = self.inner.state.lock().await;
        state
            .users
            .get(user)
            .and_then(|u| u.playlists.get(playlist))
            .and_then(|p| p.videos.get(video_id))
            .cloned()
    }

    #[cfg(test)]
    pub(crate) async fn with_state<R>(
        &self,
        f: impl FnOnce(&mut StoreState) -> R,
    ) -> R {
        let mut state = self.inner.state.lock().await;
        f(&mut state)
    }
}
