use axum::{routing::{get, post}, Router};

use crate::app::AppState;
use crate::handler::scheduler::{
    get_execution_detail, get_execution_history, get_job_list, get_latest_execution, trigger_ingest,
    trigger_rollup,
};
use crate::handler::ws_handler;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trigger-ingest", post(trigger_ingest))
        .route("/trigger-rollup", post(trigger_rollup))
        .route("/jobs", get(get_job_list))
        .route("/history", get(get_execution_history))
        .route("/history/:id", get(get_execution_detail))
        .route("/latest/:job_name", get(get_latest_execution))
        .route("/ws", get(ws_handler::ws_handler))
}
