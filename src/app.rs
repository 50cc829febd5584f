use std::sync::Arc;

use axum::Router;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use tokio::sync::Mutex;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use tracing::Level;

use crate::routes;
use crate::utils::config::IngestConfig;
use crate::utils::middleware;
use crate::utils::ws_broadcast::TaskStatusSender;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub ws_sender: TaskStatusSender,
    pub ingest_config: IngestConfig,
    /// Held for the whole of an ingestion run; one run per process.
    pub ingest_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(db_pool: DbPool, ws_sender: TaskStatusSender, ingest_config: IngestConfig) -> Self {
        Self {
            db_pool,
            ws_sender,
            ingest_config,
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().max_size(max_size.max(1)).build(manager)
}

pub fn build_app(state: AppState) -> Router {
    routes::build_routes()
        .with_state(state)
        .layer(middleware::cors_layer())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
