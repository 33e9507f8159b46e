use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::infra::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<String>,
}

pub async fn list_users(State(state): State<AppState>) -> Json<UsersResponse> {
    Json(UsersResponse {
        users: state.store.list_users().await,
    })
}
