use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Serialize;

use crate::infra::app_state::AppState;
use cueline_core::{PlaylistSummary, Video};

#[derive(Debug, Serialize)]
pub struct PlaylistsResponse {
    pub playlists: Vec<PlaylistSummary>,
}

/// Payload for the player: where to resume and what else is queued.
///
/// `completed` is set (with empty `url`/`key`) when nothing is left to watch
/// or the playlist is unknown.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentResponse {
    pub url: String,
    pub key: String,
    pub pos: i64,
    pub sorted_keys: Vec<String>,
    pub videos: HashMap<String, Video>,
    pub completed: bool,
}

impl CurrentResponse {
    fn nothing_left() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            pos: 0,
            sorted_keys: Vec::new(),
            videos: HashMap::new(),
            completed: true,
        }
    }
}

/// Unknown users get an empty list rather than an error.
pub async fn list_playlists(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Json<PlaylistsResponse> {
    let playlists = state
        .store
        .playlist_summaries(&user)
        .await
        .unwrap_or_default();
    Json(PlaylistsResponse { playlists })
}

pub async fn current_video(
    State(state): State<AppState>,
    Path((user, playlist)): Path<(String, String)>,
) -> Json<CurrentResponse> {
    let Some(current) = state.store.current_video(&user, &playlist).await else {
        return Json(CurrentResponse::nothing_left());
    };

    let response = match current.next {
        Some(next) => CurrentResponse {
            url: next.url,
            key: next.video_id,
            pos: next.position,
            sorted_keys: current.sorted_keys,
            videos: current.videos,
            completed: false,
        },
        None => CurrentResponse {
            sorted_keys: current.sorted_keys,
            videos: current.videos,
            ..CurrentResponse::nothing_left()
        },
    };
    Json(response)
}
