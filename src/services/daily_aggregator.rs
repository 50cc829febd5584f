use chrono::{Duration, NaiveDate};
use diesel::pg::PgConnection;
use diesel::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::app::DbPool;
use crate::models::{NewDaystock, Stock};
use crate::repositories::{daystock, stock};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("invalid range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("no database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("rollup worker aborted: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RollupSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub ticks: usize,
    pub days_upserted: usize,
}

/// Fold tick rows into one OHLCV row per company and calendar day.
///
/// Rows are sorted by (company, day, timestamp) first, so the arrival order
/// of the input does not matter.
pub fn rollup_ticks(mut ticks: Vec<Stock>) -> Vec<NewDaystock> {
    ticks.sort_by(|a, b| a.cid.cmp(&b.cid).then(a.date.cmp(&b.date)));

    let mut out: Vec<NewDaystock> = Vec::new();
    for tick in ticks {
        let day = tick.date.date();
        match out.last_mut() {
            Some(current) if current.cid == tick.cid && current.date == day => {
                current.close = tick.value;
                current.high = current.high.max(tick.value);
                current.low = current.low.min(tick.value);
                current.volume += tick.volume;
            }
            _ => out.push(NewDaystock {
                date: day,
                cid: tick.cid,
                open: tick.value,
                close: tick.value,
                high: tick.value,
                low: tick.value,
                volume: tick.volume,
            }),
        }
    }
    out
}

/// Recompute and upsert `daystocks` for every day in `[start, end]`.
///
/// The upsert runs in a single transaction; on error nothing of the range is
/// committed.
pub fn rollup_range(conn: &mut PgConnection, start: NaiveDate, end: NaiveDate) -> Result<RollupSummary, AggregationError> {
    if start > end {
        return Err(AggregationError::InvalidRange { start, end });
    }
    let from = start.and_time(chrono::NaiveTime::MIN);
    let until = (end + Duration::days(1)).and_time(chrono::NaiveTime::MIN);

    let ticks = stock::load_range(conn, from, until)?;
    let tick_count = ticks.len();
    let rows = rollup_ticks(ticks);

    let days_upserted = conn.transaction(|conn| daystock::upsert_batch(conn, &rows))?;

    tracing::info!(
        "daystocks rollup {} → {}: {} ticks, {} rows upserted",
        start,
        end,
        tick_count,
        days_upserted
    );
    Ok(RollupSummary {
        start,
        end,
        ticks: tick_count,
        days_upserted,
    })
}

/// Same as [`rollup_range`] but checks a connection out of the pool on a
/// blocking thread.
pub async fn run_rollup(pool: DbPool, start: NaiveDate, end: NaiveDate) -> Result<RollupSummary, AggregationError> {
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        rollup_range(&mut conn, start, end)
    })
    .await
    .unwrap_or_else(|join_err| Err(AggregationError::Worker(join_err.to_string())))
}
