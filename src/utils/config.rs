use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_INGEST_CRON: &str = "0 30 18 * * Mon-Fri";

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        Err(_) => default,
    }
}

pub struct ServerConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub db_pool_size: u32,
    pub run_migrations: bool,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_or("PORT", 8001);
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid HOST/PORT {host}:{port}: {e}"))?;
        let database_url = std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?;
        Ok(Self {
            addr,
            database_url,
            db_pool_size: env_or("DB_POOL_SIZE", 16),
            run_migrations: env_flag("RUN_MIGRATIONS", true),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub write_workers: usize,
    pub read_workers: usize,
    pub worker_timeout: Duration,
    /// Files per read/resolve/write round.
    pub batch_files: usize,
    /// `None` turns the scheduled run off.
    pub cron: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/boursorama"),
            write_workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            read_workers: 4,
            worker_timeout: Duration::from_secs(300),
            batch_files: 64,
            cron: Some(DEFAULT_INGEST_CRON.to_string()),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cron = match std::env::var("INGEST_CRON") {
            Ok(v) if v.trim().eq_ignore_ascii_case("off") => None,
            Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
            _ => defaults.cron,
        };
        Self {
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            write_workers: env_or("INGEST_WRITE_WORKERS", defaults.write_workers).max(1),
            read_workers: env_or("INGEST_READ_WORKERS", defaults.read_workers).max(1),
            worker_timeout: Duration::from_secs(env_or("INGEST_WORKER_TIMEOUT_SECS", defaults.worker_timeout.as_secs())),
            batch_files: env_or("INGEST_BATCH_FILES", defaults.batch_files).max(1),
            cron,
        }
    }

    /// Pool size needed so every write worker can hold a connection while the
    /// coordinator keeps one for bookkeeping.
    pub fn min_pool_size(&self) -> u32 {
        (self.write_workers + 2) as u32
    }
}
