pub mod public;
pub mod student;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(public::router())
        .nest("/students", student::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
