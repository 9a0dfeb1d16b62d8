//! Internal operations routes: health and cache diagnostics. These are
//! expected to be reachable only from inside the deployment.

use crate::state::AppState;
use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use pressmill_cache::CacheInfo;
use serde_json::{json, Value};

/// Create the internal router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/cache", get(cache_info).delete(cache_flush))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "cache": {
            "backend": state.cache.backend(),
            "connected": state.cache.is_remote_connected(),
        },
    }))
}

async fn cache_info(State(state): State<AppState>) -> Json<CacheInfo> {
    Json(state.cache.info())
}

async fn cache_flush(State(state): State<AppState>) -> Json<Value> {
    let flushed = state.cache.flush().await;
    Json(json!({ "flushed": flushed }))
}
