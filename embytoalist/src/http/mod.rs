// Module: http
// The inbound surface: four video routes, all dispatching into the same
// handler.

pub mod error;
pub mod videos;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/Videos/{item_id}/{filename}", get(videos::serve_video))
        .route("/videos/{item_id}/{filename}", get(videos::serve_video))
        .route("/emby/Videos/{item_id}/{filename}", get(videos::serve_video))
        .route("/emby/videos/{item_id}/{filename}", get(videos::serve_video))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
