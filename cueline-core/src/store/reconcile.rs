use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::ProgressStore;
use super::model::{Playlist, User};
use crate::catalog::Catalog;

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub users_added: usize,
    pub users_removed: usize,
    pub playlists_added: usize,
    pub playlists_removed: usize,
    pub playlists_updated: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl ProgressStore {
    /// Merge the declared users and playlists into the live store.
    ///
    /// Existing videos and their progress are never touched; only membership
    /// and the mutable playlist attributes (prefixes, max age) follow the
    /// catalog.
    pub async fn reconcile(&self, catalog: &Catalog) -> ReconcileReport {
        let mut state = self.inner.state.lock().await;
        let report = reconcile_users(&mut state.users, catalog);
        if !report.is_noop() {
            state.mark_changed();
        }
        info!(
            users_added = report.users_added,
            users_removed = report.users_removed,
            playlists_added = report.playlists_added,
            playlists_removed = report.playlists_removed,
            playlists_updated = report.playlists_updated,
            "reconciled store with catalog"
        );
        report
    }
}

pub(crate) fn reconcile_users(
    users: &mut HashMap<String, User>,
    catalog: &Catalog,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    users.retain(|username, _| {
        let keep = catalog.users.contains_key(username);
        if !keep {
            info!(user = %username, "removing user no longer in catalog");
            report.users_removed += 1;
        }
        keep
    });

    for (username, user_spec) in &catalog.users {
        let user = users.entry(username.clone()).or_insert_with(|| {
            debug!(user = %username, "user not yet present in store");
            report.users_added += 1;
            User::default()
        });

        user.playlists.retain(|name, _| {
            let keep = user_spec.playlists.contains_key(name);
            if !keep {
                info!(user = %username, playlist = %name, "removing playlist no longer in catalog");
                report.playlists_removed += 1;
            }
            keep
        });

        for (name, spec) in &user_spec.playlists {
            match user.playlists.get_mut(name) {
                Some(existing) => {
                    let max_age = spec.effective_max_age();
                    if existing.prefixes != spec.prefixes || existing.max_age != max_age {
                        existing.prefixes = spec.prefixes.clone();
                        existing.max_age = max_age;
                        report.playlists_updated += 1;
                    }
                    if existing.sort_type != spec.sort_type {
                        warn!(
                            user = %username,
                            playlist = %name,
                            stored = %existing.sort_type,
                            configured = %spec.sort_type,
                            "sort type of an existing playlist cannot change; keeping stored value"
                        );
                    }
                    debug!(user = %username, playlist = %name, "playlist already present for user");
                }
                None => {
                    user.playlists.insert(name.clone(), Playlist::from_spec(spec));
                    report.playlists_added += 1;
                    debug!(user = %username, playlist = %name, "added playlist for user");
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::catalog::MAX_AGE_SENTINEL;
    use crate::sort_key::SortType;
    use crate::storage::InMemoryObjectStore;
    use crate::store::{DEFAULT_SNAPSHOT_KEY, Video};

    fn catalog(toml: &str) -> Catalog {
        Catalog::from_toml_str(toml).unwrap()
    }

    const BASE: &str = r#"
[users.alice.playlists.shows]
prefixes = ["tv/"]
sorttype = "episode"
maxage = "48h"

[users.alice.playlists.news]
prefixes = ["news/"]
sorttype = "date"
maxage = "30m"
"#;

    fn store() -> ProgressStore {
        ProgressStore::new(Arc::new(InMemoryObjectStore::new()), DEFAULT_SNAPSHOT_KEY)
    }

    #[tokio::test]
    async fn creates_declared_users_and_playlists() {
        let store = store();
        let report = store.reconcile(&catalog(BASE)).await;

        assert_eq!(report.users_added, 1);
        assert_eq!(report.playlists_added, 2);

        let shows = store.playlist("alice", "shows").await.unwrap();
        assert_eq!(shows.sort_type, SortType::Episode);
        assert_eq!(shows.max_age, Duration::from_secs(48 * 3600));
        assert!(shows.videos.is_empty());
    }

    #[tokio::test]
    async fn tiny_max_age_becomes_sentinel() {
        let store = store();
        store.reconcile(&catalog(BASE)).await;

        let news = store.playlist("alice", "news").await.unwrap();
        assert_eq!(news.max_age, MAX_AGE_SENTINEL);
    }

    #[tokio::test]
    async fn rerun_with_same_catalog_preserves_progress() {
        let store = store();
        let catalog = catalog(BASE);
        store.reconcile(&catalog).await;
        store
            .with_state(|state| {
                let shows = state
                    .users
                    .get_mut("alice")
                    .and_then(|u| u.playlists.get_mut("shows"))
                    .unwrap();
                let mut video = Video::discovered("tv/s01e01.mp4", "s01e01.mp4", Utc::now());
                video.position = 42;
                video.completed = true;
                shows.videos.insert("s01e01_tv/s01e01.mp4".to_string(), video);
            })
            .await;

        let report = store.reconcile(&catalog).await;
        assert!(report.is_noop());

        let video = store
            .video("alice", "shows", "s01e01_tv/s01e01.mp4")
            .await
            .unwrap();
        assert_eq!(video.position, 42);
        assert!(video.completed);
    }

    #[tokio::test]
    async fn updates_mutable_attributes_in_place() {
        let store = store();
        store.reconcile(&catalog(BASE)).await;
        store
            .with_state(|state| {
                let shows = state
                    .users
                    .get_mut("alice")
                    .and_then(|u| u.playlists.get_mut("shows"))
                    .unwrap();
                shows.videos.insert(
                    "x".to_string(),
                    Video::discovered("tv/x.mp4", "x.mp4", Utc::now()),
                );
            })
            .await;

        let report = store
            .reconcile(&catalog(
                r#"
[users.alice.playlists.shows]
prefixes = ["tv/", "tv-extra/"]
sorttype = "filename"
maxage = "96h"
"#,
            ))
            .await;

        assert_eq!(report.playlists_updated, 1);
        assert_eq!(report.playlists_removed, 1);

        let shows = store.playlist("alice", "shows").await.unwrap();
        assert_eq!(shows.prefixes, vec!["tv/", "tv-extra/"]);
        assert_eq!(shows.max_age, Duration::from_secs(96 * 3600));
        assert_eq!(shows.sort_type, SortType::Episode);
        assert!(shows.videos.contains_key("x"));
        assert!(store.playlist("alice", "news").await.is_none());
    }

    #[tokio::test]
    async fn removes_users_missing_from_catalog() {
        let store = store();
        store
            .reconcile(&catalog(
                "[users.bob.playlists.clips]\nprefixes = [\"clips/\"]\n",
            ))
            .await;
        assert_eq!(store.list_users().await, vec!["bob"]);

        let report = store.reconcile(&catalog(BASE)).await;
        assert_eq!(report.users_removed, 1);
        assert_eq!(report.users_added, 1);
        assert_eq!(store.list_users().await, vec!["alice"]);
    }

    #[tokio::test]
    async fn structural_changes_mark_store_dirty() {
        let store = store();
        assert!(!store.is_dirty().await);
        store.reconcile(&catalog(BASE)).await;
        assert!(store.is_dirty().await);
    }
}
