use std::sync::Arc;

use chrono::{Duration, Utc};
use cueline_core::store::{LoadOutcome, SaveOutcome};
use cueline_core::{Catalog, DEFAULT_SNAPSHOT_KEY, InMemoryObjectStore, ProgressStore, bootstrap};

const CATALOG: &str = r#"
[users.alice.playlists.shows]
prefixes = ["tv/show/"]
sorttype = "episode"

[users.alice.playlists.news]
prefixes = ["news/"]
sorttype = "date"
maxage = "24h"

[users.bob.playlists.clips]
prefixes = ["clips/"]
"#;

fn seed_bucket() -> InMemoryObjectStore {
    let objects = InMemoryObjectStore::new();
    let recent = Utc::now() - Duration::minutes(10);
    objects.insert("tv/show/Show.S01E01.mp4", recent);
    objects.insert("tv/show/Show.S01E02.mp4", recent);
    objects.insert("tv/show/Show.S01E03.mp4", recent);
    objects.insert("tv/show/cover.jpg", recent);
    objects.insert("news/today.mp4", recent);
    objects.insert("news/last-week.mp4", Utc::now() - Duration::days(7));
    objects.insert("clips/a.mp4", recent);
    objects.insert_bytes("cueline.toml", CATALOG.as_bytes().to_vec());
    objects
}

fn store_on(objects: &InMemoryObjectStore) -> ProgressStore {
    ProgressStore::new(Arc::new(objects.clone()), DEFAULT_SNAPSHOT_KEY)
}

#[tokio::test]
async fn progress_survives_a_restart() {
    let objects = seed_bucket();
    let catalog = Catalog::load_remote(&objects, "cueline.toml").await.unwrap();

    let first = store_on(&objects);
    let report = bootstrap(&first, &catalog).await.unwrap();
    assert_eq!(report.load, LoadOutcome::Empty);
    assert_eq!(report.refresh.discovered, 6);
    assert_eq!(report.refresh.expired, 1);

    let next = first.next_up("alice", "shows").await.unwrap();
    assert_eq!(next.video_id, "s01e01_tv/show/Show.S01E01.mp4");

    first
        .set_completed("alice", "shows", &next.video_id)
        .await
        .unwrap();
    first
        .update_progress("alice", "shows", "s01e02_tv/show/Show.S01E02.mp4", 315)
        .await
        .unwrap();
    assert!(matches!(
        first.save().await.unwrap(),
        SaveOutcome::Written { .. }
    ));

    let second = store_on(&objects);
    let report = bootstrap(&second, &catalog).await.unwrap();
    assert_eq!(report.load, LoadOutcome::Restored { users: 2 });
    assert!(report.reconcile.is_noop());
    assert_eq!(report.refresh.discovered, 0);

    let next = second.next_up("alice", "shows").await.unwrap();
    assert_eq!(next.video_id, "s01e02_tv/show/Show.S01E02.mp4");
    assert_eq!(next.position, 315);

    let summaries = second.playlist_summaries("alice").await.unwrap();
    let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["news", "shows"]);
    assert_eq!((summaries[0].total, summaries[0].unwatched), (2, 1));
    assert_eq!((summaries[1].total, summaries[1].unwatched), (3, 2));
}

#[tokio::test]
async fn catalog_changes_apply_on_restart_without_losing_progress() {
    let objects = seed_bucket();
    let first = store_on(&objects);
    bootstrap(&first, &Catalog::from_toml_str(CATALOG).unwrap())
        .await
        .unwrap();
    first
        .update_progress("bob", "clips", "a.mp4", 12)
        .await
        .unwrap();
    first.save().await.unwrap();

    let trimmed = Catalog::from_toml_str(
        "[users.bob.playlists.clips]\nprefixes = [\"clips/\"]\nmaxage = \"2h\"\n",
    )
    .unwrap();
    let second = store_on(&objects);
    let report = bootstrap(&second, &trimmed).await.unwrap();

    assert_eq!(report.reconcile.users_removed, 1);
    assert_eq!(report.reconcile.playlists_updated, 1);
    assert_eq!(second.list_users().await, ["bob"]);
    assert_eq!(
        second.video("bob", "clips", "a.mp4").await.unwrap().position,
        12
    );
    assert!(second.is_dirty().await);
}
