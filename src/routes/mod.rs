use axum::Router;

use crate::app::AppState;

mod root;
mod scheduler;

pub fn build_routes() -> Router<AppState> {
    Router::new()
        .merge(root::router())
        .nest("/api/scheduler", scheduler::router())
}
