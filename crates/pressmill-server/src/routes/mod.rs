//! HTTP routes.

pub mod internal;
pub mod updates;

use crate::state::AppState;
use axum::{routing::get, Router};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/updates", get(updates::handle))
        .nest("/internal", internal::router())
        .with_state(state)
}
