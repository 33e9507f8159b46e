//! Progress-recording endpoints.
//!
//! Bodies are decoded leniently and every call answers `"ok"`: a malformed
//! body or an unknown user/playlist/video is logged by the store and
//! otherwise ignored.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use tracing::debug;

use crate::infra::app_state::AppState;

/// Request body shared by the progress endpoints; `position` is only read by
/// the update call.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProgressRequest {
    pub user: String,
    pub playlist: String,
    pub key: String,
    pub position: i64,
}

impl ProgressRequest {
    fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|err| {
            debug!(error = %err, "ignoring malformed progress request body");
            Self::default()
        })
    }
}

const OK: &str = "ok";

pub async fn update_current(State(state): State<AppState>, body: Bytes) -> Json<&'static str> {
    let request = ProgressRequest::from_body(&body);
    let _ = state
        .store
        .update_progress(&request.user, &request.playlist, &request.key, request.position)
        .await;
    Json(OK)
}

pub async fn set_completed(State(state): State<AppState>, body: Bytes) -> Json<&'static str> {
    let request = ProgressRequest::from_body(&body);
    let _ = state
        .store
        .set_completed(&request.user, &request.playlist, &request.key)
        .await;
    Json(OK)
}

pub async fn toggle_completed(State(state): State<AppState>, body: Bytes) -> Json<&'static str> {
    let request = ProgressRequest::from_body(&body);
    if let Ok(completed) = state
        .store
        .toggle_completed(&request.user, &request.playlist, &request.key)
        .await
    {
        debug!(user = %request.user, playlist = %request.playlist, key = %request.key, completed, "toggled completion");
    }
    Json(OK)
}
