use chrono::NaiveDate;

use crate::app::AppState;
use crate::models::{JobStatus, UpdateJobExecutionHistory};
use crate::scheduler::{record_finish, record_start};
use crate::services::daily_aggregator::{self, RollupSummary};
use crate::utils::ws_broadcast::broadcast_task_status;

pub const ROLLUP_JOB: &str = "daystocks_rollup";

/// Recompute `daystocks` for `[start, end]` on demand.
pub async fn run_rollup_task(state: &AppState, start: NaiveDate, end: NaiveDate) -> anyhow::Result<RollupSummary> {
    let scope = format!("{start}..={end}");
    let started_at = chrono::Local::now().naive_local();
    let history_id = record_start(&state.db_pool, ROLLUP_JOB, Some(scope.clone()), started_at);
    broadcast_task_status(&state.ws_sender, ROLLUP_JOB, JobStatus::Running.as_str(), Some(&scope));

    let result = daily_aggregator::run_rollup(state.db_pool.clone(), start, end).await;
    let completed_at = chrono::Local::now().naive_local();

    let (status, update) = match &result {
        Ok(summary) => (
            JobStatus::Success,
            UpdateJobExecutionHistory::finished(JobStatus::Success, started_at, completed_at)
                .with_counts(summary.ticks, summary.days_upserted, 0, 0)
                .with_details(serde_json::to_value(summary).ok()),
        ),
        Err(e) => {
            tracing::error!("rollup {} failed: {}", scope, e);
            (
                JobStatus::Failed,
                UpdateJobExecutionHistory::finished(JobStatus::Failed, started_at, completed_at).with_error(e.to_string()),
            )
        }
    };
    record_finish(&state.db_pool, history_id, update);
    broadcast_task_status(&state.ws_sender, ROLLUP_JOB, status.as_str(), Some(&scope));

    Ok(result?)
}
