pub mod api_models;
pub mod app;
pub mod handler;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod services;
pub mod utils;

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Apply pending migrations and return how many ran.
pub fn run_migrations(conn: &mut PgConnection) -> anyhow::Result<usize> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("migrations failed: {e}"))?;
    for version in &applied {
        tracing::info!("applied migration {}", version);
    }
    Ok(applied.len())
}
