use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::PlaylistSpec;
use crate::sort_key::SortType;

/// A user and the playlists declared for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub playlists: HashMap<String, Playlist>,
}

/// One resumable queue of discovered videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub prefixes: Vec<String>,
    pub sort_type: SortType,
    pub max_age: Duration,
    #[serde(default)]
    pub videos: HashMap<String, Video>,
    /// Ascending video ids. Derived; rebuilt after every refresh and load.
    #[serde(skip)]
    sorted_keys: Vec<String>,
}

/// A discovered media object and the viewer's progress through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub position: i64,
    pub filename: String,
    pub key: String,
    pub completed: bool,
    /// Last-modified time of the backing object when it was discovered.
    pub changed: DateTime<Utc>,
}

impl Video {
    pub fn discovered(
        key: impl Into<String>,
        filename: impl Into<String>,
        changed: DateTime<Utc>,
    ) -> Self {
        Self {
            position: 0,
            filename: filename.into(),
            key: key.into(),
            completed: false,
            changed,
        }
    }
}

impl Playlist {
    pub fn from_spec(spec: &PlaylistSpec) -> Self {
        Self {
            prefixes: spec.prefixes.clone(),
            sort_type: spec.sort_type,
            max_age: spec.effective_max_age(),
            videos: HashMap::new(),
            sorted_keys: Vec::new(),
        }
    }

    pub fn sorted_keys(&self) -> &[String] {
        &self.sorted_keys
    }

    /// Rebuild the ordering from scratch out of the current video ids.
    pub fn resort(&mut self) {
        let mut keys: Vec<String> = self.videos.keys().cloned().collect();
        keys.sort_unstable();
        self.sorted_keys = keys;
    }

    /// First video in order that has not been completed.
    pub fn next_up(&self) -> Option<(&str, &Video)> {
        self.sorted_keys.iter().find_map(|id| {
            self.videos
                .get(id)
                .filter(|video| !video.completed)
                .map(|video| (id.as_str(), video))
        })
    }

    pub fn unwatched_count(&self) -> usize {
        self.videos.values().filter(|video| !video.completed).count()
    }
}

/// Everything behind the store lock.
///
/// Dirtiness is tracked as a mutation counter so a snapshot written outside
/// the lock only clears the mutations it actually captured.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) users: HashMap<String, User>,
    revision: u64,
    saved_revision: u64,
}

impl StoreState {
    pub(crate) fn mark_changed(&mut self) {
        self.revision += 1;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = self.saved_revision.max(revision);
    }

    /// Swap in freshly loaded users; the store starts clean.
    pub(crate) fn replace_users(&mut self, users: HashMap<String, User>) {
        self.users = users;
        self.saved_revision = self.revision;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn video(key: &str, completed: bool) -> Video {
        let mut video = Video::discovered(key, key, Utc.timestamp_opt(0, 0).unwrap());
        video.completed = completed;
        video
    }

    fn playlist_with(videos: &[(&str, bool)]) -> Playlist {
        let mut playlist = Playlist::from_spec(&PlaylistSpec::default());
        for (id, completed) in videos {
            playlist.videos.insert(id.to_string(), video(id, *completed));
        }
        playlist.resort();
        playlist
    }

    #[test]
    fn resort_orders_ids_regardless_of_insertion() {
        let playlist = playlist_with(&[("c", false), ("a", false), ("b", false)]);
        assert_eq!(playlist.sorted_keys(), ["a", "b", "c"]);
    }

    #[test]
    fn next_up_skips_completed_videos() {
        let playlist = playlist_with(&[("A", true), ("B", false), ("C", false)]);
        let (id, _) = playlist.next_up().unwrap();
        assert_eq!(id, "B");
    }

    #[test]
    fn next_up_is_none_when_everything_is_watched() {
        let playlist = playlist_with(&[("A", true), ("B", true)]);
        assert!(playlist.next_up().is_none());
        assert_eq!(playlist.unwatched_count(), 0);
    }

    #[test]
    fn sorted_keys_are_not_serialized() {
        let playlist = playlist_with(&[("a", false)]);
        let json = serde_json::to_value(&playlist).unwrap();
        assert!(json.get("sorted_keys").is_none());

        let restored: Playlist = serde_json::from_value(json).unwrap();
        assert!(restored.sorted_keys().is_empty());
    }

    #[test]
    fn dirty_tracking_survives_interleaved_saves() {
        let mut state = StoreState::default();
        assert!(!state.is_dirty());

        state.mark_changed();
        let captured = state.revision();
        state.mark_changed();
        state.mark_saved(captured);
        assert!(state.is_dirty());

        state.mark_saved(state.revision());
        assert!(!state.is_dirty());
    }
}
