use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::ProgressStore;
use super::model::User;
use crate::error::SnapshotError;

/// Encoding version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed since the last successful write.
    Skipped,
    Written { bytes: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot exists yet; the store stays empty.
    Empty,
    Restored { users: usize },
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    users: &'a HashMap<String, User>,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Deserialize)]
struct Snapshot {
    #[serde(default)]
    users: HashMap<String, User>,
}

pub(crate) fn encode(
    users: &HashMap<String, User>,
    saved_at: DateTime<Utc>,
) -> Result<Vec<u8>, SnapshotError> {
    serde_json::to_vec(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        saved_at,
        users,
    })
    .map_err(SnapshotError::Encode)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<HashMap<String, User>, SnapshotError> {
    let probe: VersionProbe =
        serde_json::from_slice(bytes).map_err(SnapshotError::Decode)?;
    if probe.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version {
            found: probe.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let snapshot: Snapshot =
        serde_json::from_slice(bytes).map_err(SnapshotError::Decode)?;
    let mut users = snapshot.users;
    for user in users.values_mut() {
        for playlist in user.playlists.values_mut() {
            playlist.resort();
        }
    }
    Ok(users)
}

impl ProgressStore {
    /// Write the whole store to the snapshot key if anything changed.
    ///
    /// The store stays dirty when the write fails so the next tick retries.
    pub async fn save(&self) -> Result<SaveOutcome, SnapshotError> {
        let _write = self.inner.save_gate.lock().await;

        let (bytes, revision) = {
            let state = self.inner.state.lock().await;
            if !state.is_dirty() {
                debug!("store unchanged; skipping snapshot");
                return Ok(SaveOutcome::Skipped);
            }
            (encode(&state.users, Utc::now())?, state.revision())
        };

        let size = bytes.len();
        if let Err(err) = self
            .inner
            .objects
            .put_object(&self.inner.snapshot_key, bytes)
            .await
        {
            error!(key = %self.inner.snapshot_key, error = %err, "failed to write snapshot");
            return Err(err.into());
        }

        self.inner.state.lock().await.mark_saved(revision);
        info!(key = %self.inner.snapshot_key, bytes = size, "saved snapshot");
        Ok(SaveOutcome::Written { bytes: size })
    }

    /// Replace the in-memory store with the persisted snapshot, if any.
    pub async fn load(&self) -> Result<LoadOutcome, SnapshotError> {
        let Some(bytes) = self
            .inner
            .objects
            .get_object(&self.inner.snapshot_key)
            .await?
        else {
            info!(key = %self.inner.snapshot_key, "no snapshot found; starting empty");
            return Ok(LoadOutcome::Empty);
        };

        let users = decode(&bytes)?;
        let count = users.len();
        self.inner.state.lock().await.replace_users(users);
        info!(key = %self.inner.snapshot_key, users = count, "loaded snapshot");
        Ok(LoadOutcome::Restored { users: count })
    }
}
