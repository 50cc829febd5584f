use std::time::{Duration, Instant};

use diesel::pg::PgConnection;
use diesel::{Connection, RunQueryDsl};
use thiserror::Error;

use crate::app::DbPool;
use crate::models::NewStock;
use crate::repositories::{file_done, stock};
use crate::utils::partition::{run_partitioned, PartitionReport};

/// How long the join waits past the deadline for workers to roll back.
const JOIN_GRACE: Duration = Duration::from_secs(10);

/// Tick rows produced from one snapshot file.
#[derive(Debug, Clone)]
pub struct FileRows {
    pub filename: String,
    pub rows: Vec<NewStock>,
}

#[derive(Debug, Error)]
pub enum PartitionWriteError {
    #[error("deadline passed before the partition committed")]
    DeadlineExceeded,
    #[error("no database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Debug, Default)]
pub struct LoadResult {
    pub report: PartitionReport,
    /// Files whose rows and done mark were committed.
    pub completed: Vec<String>,
    /// Files of partitions that rolled back; none of their rows are stored.
    pub failed: Vec<String>,
}

/// Fans file writes out over parallel workers, one pooled connection and one
/// transaction each.
#[derive(Clone)]
pub struct LoadCoordinator {
    pool: DbPool,
    workers: usize,
    worker_timeout: Duration,
}

impl LoadCoordinator {
    pub fn new(pool: DbPool, workers: usize, worker_timeout: Duration) -> Self {
        Self {
            pool,
            workers: workers.max(1),
            worker_timeout,
        }
    }

    /// Write every file's rows, mark them done, and report which files made it.
    pub async fn load(&self, files: Vec<FileRows>) -> LoadResult {
        if files.is_empty() {
            return LoadResult::default();
        }
        let names: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
        let rows: usize = files.iter().map(|f| f.rows.len()).sum();
        tracing::info!(
            "writing {} tick rows from {} files over {} workers",
            rows,
            files.len(),
            self.workers.min(files.len())
        );

        let pool = self.pool.clone();
        let report = run_partitioned(
            files,
            self.workers,
            self.worker_timeout,
            JOIN_GRACE,
            move |_, chunk: Vec<FileRows>, deadline| -> Result<usize, PartitionWriteError> {
                let mut conn = pool.get_timeout(remaining(deadline)?)?;
                write_partition(&mut conn, &chunk, deadline)
            },
        )
        .await;

        let (completed, failed) = split_by_outcome(names, &report);
        LoadResult {
            report,
            completed,
            failed,
        }
    }
}

fn remaining(deadline: Instant) -> Result<Duration, PartitionWriteError> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
        .ok_or(PartitionWriteError::DeadlineExceeded)
}

/// Insert the rows of `files` and mark them done in a single transaction.
///
/// Statements are capped by the time left before `deadline`, and the
/// transaction rolls back rather than commit once the deadline has passed.
pub fn write_partition(conn: &mut PgConnection, files: &[FileRows], deadline: Instant) -> Result<usize, PartitionWriteError> {
    conn.transaction(|conn| {
        let budget_ms = remaining(deadline)?.as_millis().max(1);
        diesel::sql_query(format!("SET LOCAL statement_timeout = {budget_ms}")).execute(conn)?;

        let mut written = 0;
        for file in files {
            written += stock::insert_batch(conn, &file.rows)?;
            file_done::mark_done(conn, &file.filename)?;
        }

        remaining(deadline)?;
        Ok(written)
    })
}

fn split_by_outcome(names: Vec<String>, report: &PartitionReport) -> (Vec<String>, Vec<String>) {
    let mut completed = Vec::new();
    let mut failed = Vec::new();
    for (position, filename) in names.into_iter().enumerate() {
        if report.outcome_of(position).is_some_and(|o| o.succeeded()) {
            completed.push(filename);
        } else {
            failed.push(filename);
        }
    }
    (completed, failed)
}
