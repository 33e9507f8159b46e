use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use super::ProgressStore;
use super::model::{Playlist, Video};
use crate::sort_key::{SortType, basename, video_id};
use crate::storage::{ObjectInfo, ObjectStore};

/// Only objects with this suffix are treated as videos.
pub const VIDEO_EXTENSION: &str = ".mp4";

/// Upper bound on concurrent existence probes per playlist.
const PROBE_CONCURRENCY: usize = 8;

/// Counters for one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub playlists: usize,
    pub removed: usize,
    pub discovered: usize,
    pub expired: usize,
    /// Prefixes whose listing failed and were skipped for this pass.
    pub skipped_prefixes: usize,
    /// Objects skipped because no video id could be derived.
    pub skipped_files: usize,
}

impl RefreshReport {
    fn changed(&self) -> bool {
        self.removed + self.discovered + self.expired > 0
    }
}

/// What the remote pass needs to know about one playlist.
struct PlaylistPlan {
    user: String,
    playlist: String,
    sort_type: SortType,
    prefixes: Vec<String>,
    tracked: Vec<(String, String)>,
}

/// Remote observations for one playlist, applied under the lock.
struct PlaylistScan {
    user: String,
    playlist: String,
    missing: Vec<String>,
    found: Vec<Discovered>,
}

struct Discovered {
    id: String,
    key: String,
    last_modified: DateTime<Utc>,
}

impl ProgressStore {
    /// Bring every playlist in line with the object store.
    ///
    /// Per playlist: drop videos whose object is gone, add newly listed
    /// objects, rebuild the ordering and auto-complete anything older than
    /// the playlist's max age. Remote calls happen without the store lock;
    /// all results land in a single locked section so readers never observe
    /// a half-applied pass.
    pub async fn refresh(&self) -> RefreshReport {
        let _pass = self.inner.refresh_gate.lock().await;
        let mut report = RefreshReport::default();

        let plans = self.plan_refresh().await;
        report.playlists = plans.len();

        let mut scans = Vec::with_capacity(plans.len());
        for plan in plans {
            scans.push(scan_playlist(Arc::clone(&self.inner.objects), plan, &mut report).await);
        }

        let now = Utc::now();
        let mut state = self.inner.state.lock().await;
        for scan in scans {
            let Some(playlist) = state
                .users
                .get_mut(&scan.user)
                .and_then(|user| user.playlists.get_mut(&scan.playlist))
            else {
                debug!(user = %scan.user, playlist = %scan.playlist, "playlist vanished during refresh");
                continue;
            };
            apply_scan(playlist, &scan, now, &mut report);
        }
        if report.changed() {
            state.mark_changed();
        }
        drop(state);

        info!(
            playlists = report.playlists,
            removed = report.removed,
            discovered = report.discovered,
            expired = report.expired,
            skipped_prefixes = report.skipped_prefixes,
            skipped_files = report.skipped_files,
            "refresh finished"
        );
        report
    }

    async fn plan_refresh(&self) -> Vec<PlaylistPlan> {
        let state = self.inner.state.lock().await;
        let mut plans = Vec::new();
        for (username, user) in &state.users {
            for (name, playlist) in &user.playlists {
                plans.push(PlaylistPlan {
                    user: username.clone(),
                    playlist: name.clone(),
                    sort_type: playlist.sort_type,
                    prefixes: playlist.prefixes.clone(),
                    tracked: playlist
                        .videos
                        .iter()
                        .map(|(id, video)| (id.clone(), video.key.clone()))
                        .collect(),
                });
            }
        }
        plans
    }
}

async fn scan_playlist(
    objects: Arc<dyn ObjectStore>,
    plan: PlaylistPlan,
    report: &mut RefreshReport,
) -> PlaylistScan {
    let PlaylistPlan {
        user,
        playlist,
        sort_type,
        prefixes,
        tracked,
    } = plan;

    let missing: Vec<String> = stream::iter(tracked)
        .map(|(id, key)| {
            let objects = Arc::clone(&objects);
            let user = user.clone();
            let playlist = playlist.clone();
            async move {
                match objects.object_exists(&key).await {
                    Ok(true) => None,
                    Ok(false) => {
                        info!(%user, %playlist, %key, "object no longer exists; removing video");
                        Some(id)
                    }
                    Err(err) => {
                        warn!(%user, %playlist, %key, error = %err, "could not confirm object exists; removing video");
                        Some(id)
                    }
                }
            }
        })
        .buffer_unordered(PROBE_CONCURRENCY)
        .filter_map(|missing| async move { missing })
        .collect()
        .await;

    let mut found = Vec::new();
    for prefix in &prefixes {
        let listed: Vec<ObjectInfo> =
            match objects.list_objects(prefix, true).try_collect().await {
                Ok(listed) => listed,
                Err(err) => {
                    warn!(%user, %playlist, %prefix, error = %err, "listing failed; skipping prefix this pass");
                    report.skipped_prefixes += 1;
                    continue;
                }
            };

        for object in listed {
            if !object.key.ends_with(VIDEO_EXTENSION) {
                continue;
            }
            match video_id(sort_type, &object.key, object.last_modified) {
                Ok(id) => found.push(Discovered {
                    id,
                    key: object.key,
                    last_modified: object.last_modified,
                }),
                Err(err) => {
                    debug!(%user, %playlist, key = %object.key, "{err}");
                    report.skipped_files += 1;
                }
            }
        }
    }

    PlaylistScan {
        user,
        playlist,
        missing,
        found,
    }
}

fn apply_scan(
    playlist: &mut Playlist,
    scan: &PlaylistScan,
    now: DateTime<Utc>,
    report: &mut RefreshReport,
) {
    for id in &scan.missing {
        if playlist.videos.remove(id).is_some() {
            report.removed += 1;
        }
    }

    for item in &scan.found {
        if playlist.videos.contains_key(&item.id) {
            continue;
        }
        debug!(user = %scan.user, playlist = %scan.playlist, key = %item.key, "discovered video");
        playlist.videos.insert(
            item.id.clone(),
            Video::discovered(&item.key, basename(&item.key), item.last_modified),
        );
        report.discovered += 1;
    }

    playlist.resort();

    report.expired += expire_stale(playlist, now);
}

/// Mark every unwatched video older than the playlist's max age completed.
fn expire_stale(playlist: &mut Playlist, now: DateTime<Utc>) -> usize {
    let cutoff = chrono::Duration::from_std(playlist.max_age)
        .ok()
        .and_then(|max_age| now.checked_sub_signed(max_age));
    let Some(cutoff) = cutoff else {
        return 0;
    };

    let mut expired = 0;
    for video in playlist.videos.values_mut() {
        if !video.completed && cutoff > video.changed {
            video.completed = true;
            expired += 1;
        }
    }
    expired
}
