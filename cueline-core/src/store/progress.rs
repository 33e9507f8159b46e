use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::ProgressStore;
use super::model::{Playlist, User, Video};
use crate::error::LookupMiss;

/// Lifetime of the retrieval URL handed out for the next video.
pub const PLAYBACK_URL_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// The video a user should watch next in a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextUp {
    pub url: String,
    pub video_id: String,
    pub position: i64,
}

/// Read projection backing the "current video" endpoint.
#[derive(Debug, Clone)]
pub struct CurrentVideo {
    pub next: Option<NextUp>,
    pub sorted_keys: Vec<String>,
    pub videos: HashMap<String, Video>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistSummary {
    pub name: String,
    #[serde(rename = "count")]
    pub total: usize,
    #[serde(rename = "new")]
    pub unwatched: usize,
}

fn find_playlist<'a>(
    users: &'a HashMap<String, User>,
    user: &str,
    playlist: &str,
) -> Result<&'a Playlist, LookupMiss> {
    users
        .get(user)
        .ok_or_else(|| LookupMiss::UserMissing(user.to_string()))?
        .playlists
        .get(playlist)
        .ok_or_else(|| LookupMiss::PlaylistMissing {
            user: user.to_string(),
            playlist: playlist.to_string(),
        })
}

fn find_video_mut<'a>(
    users: &'a mut HashMap<String, User>,
    user: &str,
    playlist: &str,
    video_id: &str,
) -> Result<&'a mut Video, LookupMiss> {
    users
        .get_mut(user)
        .ok_or_else(|| LookupMiss::UserMissing(user.to_string()))?
        .playlists
        .get_mut(playlist)
        .ok_or_else(|| LookupMiss::PlaylistMissing {
            user: user.to_string(),
            playlist: playlist.to_string(),
        })?
        .videos
        .get_mut(video_id)
        .ok_or_else(|| LookupMiss::VideoMissing {
            user: user.to_string(),
            playlist: playlist.to_string(),
            video: video_id.to_string(),
        })
}

impl ProgressStore {
    /// Next unwatched video with a fresh retrieval URL.
    ///
    /// Unknown user/playlist, a fully watched playlist and a presign failure
    /// all come back as `None`.
    pub async fn next_up(&self, user: &str, playlist: &str) -> Option<NextUp> {
        let candidate = {
            let state = self.inner.state.lock().await;
            match find_playlist(&state.users, user, playlist) {
                Ok(found) => found.next_up().map(|(id, video)| {
                    (id.to_string(), video.key.clone(), video.position)
                }),
                Err(miss) => {
                    warn!(user, playlist, "{miss}");
                    None
                }
            }
        };

        self.presign_next(user, playlist, candidate).await
    }

    /// Next-up info plus the full ordered playlist, or `None` if the
    /// user/playlist is unknown.
    pub async fn current_video(
        &self,
        user: &str,
        playlist: &str,
    ) -> Option<CurrentVideo> {
        let (candidate, sorted_keys, videos) = {
            let state = self.inner.state.lock().await;
            let found = match find_playlist(&state.users, user, playlist) {
                Ok(found) => found,
                Err(miss) => {
                    warn!(user, playlist, "{miss}");
                    return None;
                }
            };
            let candidate = found.next_up().map(|(id, video)| {
                (id.to_string(), video.key.clone(), video.position)
            });
            (candidate, found.sorted_keys().to_vec(), found.videos.clone())
        };

        let next = self.presign_next(user, playlist, candidate).await;
        Some(CurrentVideo {
            next,
            sorted_keys,
            videos,
        })
    }

    async fn presign_next(
        &self,
        user: &str,
        playlist: &str,
        candidate: Option<(String, String, i64)>,
    ) -> Option<NextUp> {
        let (video_id, key, position) = candidate?;
        debug!(user, playlist, key = %key, "is up next");
        match self.inner.objects.presigned_url(&key, PLAYBACK_URL_TTL).await {
            Ok(url) => Some(NextUp {
                url,
                video_id,
                position,
            }),
            Err(err) => {
                warn!(user, playlist, key = %key, error = %err, "could not get presigned url");
                None
            }
        }
    }

    pub async fn update_progress(
        &self,
        user: &str,
        playlist: &str,
        video_id: &str,
        position: i64,
    ) -> Result<(), LookupMiss> {
        let mut state = self.inner.state.lock().await;
        match find_video_mut(&mut state.users, user, playlist, video_id) {
            Ok(video) => {
                video.position = position;
                state.mark_changed();
                Ok(())
            }
            Err(miss) => {
                warn!(user, playlist, key = video_id, "{miss}");
                Err(miss)
            }
        }
    }

    pub async fn set_completed(
        &self,
        user: &str,
        playlist: &str,
        video_id: &str,
    ) -> Result<(), LookupMiss> {
        let mut state = self.inner.state.lock().await;
        match find_video_mut(&mut state.users, user, playlist, video_id) {
            Ok(video) => {
                video.completed = true;
                state.mark_changed();
                Ok(())
            }
            Err(miss) => {
                warn!(user, playlist, key = video_id, "{miss}");
                Err(miss)
            }
        }
    }

    /// Flip the completed flag, returning the new value.
    pub async fn toggle_completed(
        &self,
        user: &str,
        playlist: &str,
        video_id: &str,
    ) -> Result<bool, LookupMiss> {
        let mut state = self.inner.state.lock().await;
        match find_video_mut(&mut state.users, user, playlist, video_id) {
            Ok(video) => {
                video.completed = !video.completed;
                let completed = video.completed;
                state.mark_changed();
                Ok(completed)
            }
            Err(miss) => {
                warn!(user, playlist, key = video_id, "{miss}");
                Err(miss)
            }
        }
    }

    /// Usernames in alphabetical order.
    pub async fn list_users(&self) -> Vec<String> {
        let state = self.inner.state.lock().await;
        let mut users: Vec<String> = state.users.keys().cloned().collect();
        users.sort();
        users
    }

    /// Per-playlist counts for a user, alphabetical by playlist name.
    /// `None` when the user is unknown.
    pub async fn playlist_summaries(&self, user: &str) -> Option<Vec<PlaylistSummary>> {
        let state = self.inner.state.lock().await;
        let Some(found) = state.users.get(user) else {
            warn!(user, "user not present");
            return None;
        };

        let mut summaries: Vec<PlaylistSummary> = found
            .playlists
            .iter()
            .map(|(name, playlist)| PlaylistSummary {
                name: name.clone(),
                total: playlist.videos.len(),
                unwatched: playlist.unwatched_count(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Some(summaries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::catalog::PlaylistSpec;
    use crate::storage::InMemoryObjectStore;
    use crate::store::DEFAULT_SNAPSHOT_KEY;

    async fn seeded(objects: &InMemoryObjectStore) -> ProgressStore {
        let store = ProgressStore::new(Arc::new(objects.clone()), DEFAULT_SNAPSHOT_KEY);
        store
            .with_state(|state| {
                let mut playlist = Playlist::from_spec(&PlaylistSpec::default());
                for (id, completed) in [("A", true), ("B", false), ("C", false)] {
                    let key = format!("tv/{id}.mp4");
                    let mut video =
                        Video::discovered(&key, format!("{id}.mp4"), Utc.timestamp_opt(0, 0).unwrap());
                    video.completed = completed;
                    playlist.videos.insert(id.to_string(), video);
                }
                playlist.resort();

                let mut alice = User::default();
                alice.playlists.insert("shows".to_string(), playlist);
                alice
                    .playlists
                    .insert("empty".to_string(), Playlist::from_spec(&PlaylistSpec::default()));
                state.users.insert("alice".to_string(), alice);
                state.users.insert("bob".to_string(), User::default());
            })
            .await;
        store
    }

    #[tokio::test]
    async fn next_up_returns_first_incomplete_video() {
        let objects = InMemoryObjectStore::new();
        let store = seeded(&objects).await;

        let next = store.next_up("alice", "shows").await.unwrap();
        assert_eq!(next.video_id, "B");
        assert_eq!(next.position, 0);
        assert_eq!(next.url, "memory://tv/B.mp4?expires_in=43200");
    }

    #[tokio::test]
    async fn next_up_is_empty_for_unknown_or_finished_playlists() {
        let objects = InMemoryObjectStore::new();
        let store = seeded(&objects).await;

        assert!(store.next_up("nobody", "shows").await.is_none());
        assert!(store.next_up("alice", "missing").await.is_none());
        assert!(store.next_up("alice", "empty").await.is_none());
    }

    #[tokio::test]
    async fn presign_failure_reads_as_nothing_next() {
        let objects = InMemoryObjectStore::new();
        let store = seeded(&objects).await;
        objects.fail_presign(true);

        assert!(store.next_up("alice", "shows").await.is_none());
        let current = store.current_video("alice", "shows").await.unwrap();
        assert!(current.next.is_none());
        assert_eq!(current.sorted_keys, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn update_progress_moves_position_and_marks_dirty() {
        let objects = InMemoryObjectStore::new();
        let store = seeded(&objects).await;
        assert!(!store.is_dirty().await);

        store.update_progress("alice", "shows", "B", 42).await.unwrap();

        assert!(store.is_dirty().await);
        assert_eq!(store.video("alice", "shows", "B").await.unwrap().position, 42);
        assert_eq!(store.next_up("alice", "shows").await.unwrap().position, 42);
    }

    #[tokio::test]
    async fn misses_are_reported_without_mutating() {
        let objects = InMemoryObjectStore::new();
        let store = seeded(&objects).await;

        assert_eq!(
            store.update_progress("carol", "shows", "B", 1).await,
            Err(LookupMiss::UserMissing("carol".to_string()))
        );
        assert!(matches!(
            store.set_completed("alice", "nope", "B").await,
            Err(LookupMiss::PlaylistMissing { .. })
        ));
        assert!(matches!(
            store.toggle_completed("alice", "shows", "Z").await,
            Err(LookupMiss::VideoMissing { .. })
        ));
        assert!(!store.is_dirty().await);
    }

    #[tokio::test]
    async fn completion_advances_next_up() {
        let objects = InMemoryObjectStore::new();
        let store = seeded(&objects).await;

        store.set_completed("alice", "shows", "B").await.unwrap();
        assert_eq!(store.next_up("alice", "shows").await.unwrap().video_id, "C");

        assert_eq!(store.toggle_completed("alice", "shows", "A").await, Ok(false));
        assert_eq!(store.next_up("alice", "shows").await.unwrap().video_id, "A");
        assert_eq!(store.toggle_completed("alice", "shows", "A").await, Ok(true));
    }

    #[tokio::test]
    async fn listings_are_alphabetical() {
        let objects = InMemoryObjectStore::new();
        let store = seeded(&objects).await;

        assert_eq!(store.list_users().await, vec!["alice", "bob"]);

        let summaries = store.playlist_summaries("alice").await.unwrap();
        assert_eq!(
            summaries,
            vec![
                PlaylistSummary {
                    name: "empty".to_string(),
                    total: 0,
                    unwatched: 0
                },
                PlaylistSummary {
                    name: "shows".to_string(),
                    total: 3,
                    unwatched: 2
                },
            ]
        );
        assert_eq!(store.playlist_summaries("bob").await, Some(Vec::new()));
        assert!(store.playlist_summaries("zed").await.is_none());
    }
}
