use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::app::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
}

async fn root() -> &'static str {
    "bourse-ingest"
}

/// 200 when a pooled connection can be checked out, 503 otherwise.
async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let pool = state.db_pool.state();
    let body = json!({
        "connections": pool.connections,
        "idle": pool.idle_connections,
        "ingesting": state.ingest_lock.try_lock().is_err(),
    });
    match state.db_pool.get_timeout(std::time::Duration::from_secs(2)) {
        Ok(_) => (StatusCode::OK, Json(body)),
        Err(e) => {
            tracing::warn!("health check: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(body))
        }
    }
}
