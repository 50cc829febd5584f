use std::net::SocketAddr;

use bourse_ingest::app::{self, AppState};
use bourse_ingest::utils::config::{IngestConfig, ServerConfig};
use bourse_ingest::utils::{logging, ws_broadcast};
use bourse_ingest::{run_migrations, scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _log_guard = logging::init_logging();

    let cfg = ServerConfig::from_env()?;
    let ingest_config = IngestConfig::from_env();
    tracing::info!("ingest config: {:?}", ingest_config);

    let pool_size = cfg.db_pool_size.max(ingest_config.min_pool_size());
    let db_pool = app::build_pool(&cfg.database_url, pool_size)?;

    if cfg.run_migrations {
        let mut conn = db_pool.get()?;
        let applied = run_migrations(&mut conn)?;
        tracing::info!("{} pending migrations applied", applied);
    }

    let state = AppState::new(db_pool, ws_broadcast::create_broadcast_channel(), ingest_config);
    let _scheduler = scheduler::start_scheduler(state.clone()).await?;
    let app = app::build_app(state);

    let addr: SocketAddr = cfg.addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
