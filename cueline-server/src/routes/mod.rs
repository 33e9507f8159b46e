use std::path::Path;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::infra::app_state::AppState;

/// API routes. Every path is reachable with and without a trailing slash so
/// existing clients keep working.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/", get(handlers::list_users))
        .route("/api/playlists/{user}", get(handlers::list_playlists))
        .route("/api/playlists/{user}/", get(handlers::list_playlists))
        .route("/api/current/{user}/{playlist}", get(handlers::current_video))
        .route("/api/current/{user}/{playlist}/", get(handlers::current_video))
        .route("/api/updatecurrent", post(handlers::update_current))
        .route("/api/updatecurrent/", post(handlers::update_current))
        .route("/api/setcompleted", post(handlers::set_completed))
        .route("/api/setcompleted/", post(handlers::set_completed))
        .route("/api/togglecompleted", post(handlers::toggle_completed))
        .route("/api/togglecompleted/", post(handlers::toggle_completed))
        .route("/health", get(handlers::health))
}

/// Full application: API, static assets and request tracing.
pub fn create_app(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    let mut router = create_api_router();

    if let Some(dir) = static_dir.as_deref() {
        router = with_static_assets(router, dir);
    }

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn with_static_assets(router: Router<AppState>, dir: &Path) -> Router<AppState> {
    tracing::info!(dir = %dir.display(), "serving static assets");
    router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
}
