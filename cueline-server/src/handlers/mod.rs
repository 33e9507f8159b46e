//! HTTP request handlers organized by functionality

pub mod playlists;
pub mod progress;
pub mod users;

use axum::response::Json;
use serde_json::{Value, json};

pub use playlists::{current_video, list_playlists};
pub use progress::{set_completed, toggle_completed, update_current};
pub use users::list_users;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
