pub mod ingest_job;
pub mod rollup_job;

use chrono::NaiveDateTime;
use tokio_cron_scheduler::JobScheduler;

use crate::app::{AppState, DbPool};
use crate::models::{NewJobExecutionHistory, UpdateJobExecutionHistory};
use crate::repositories::job_execution_history;

/// Register the cron jobs and start the scheduler. The returned handle must
/// be kept alive.
pub async fn start_scheduler(state: AppState) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    match state.ingest_config.cron.clone() {
        Some(cron) => ingest_job::create_ingest_job(&scheduler, state, &cron).await?,
        None => tracing::info!("scheduled ingestion disabled (INGEST_CRON=off)"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Open a `running` history row. A failure here is logged and the job runs
/// untracked.
pub(crate) fn record_start(pool: &DbPool, job_name: &str, scope: Option<String>, started_at: NaiveDateTime) -> Option<i32> {
    let created = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|mut conn| {
            job_execution_history::create(&mut conn, &NewJobExecutionHistory::running(job_name, scope, started_at))
                .map_err(|e| e.to_string())
        });
    match created {
        Ok(history) => {
            tracing::info!("{} run recorded as history #{}", job_name, history.id);
            Some(history.id)
        }
        Err(e) => {
            tracing::warn!("could not record {} run: {}", job_name, e);
            None
        }
    }
}

pub(crate) fn record_finish(pool: &DbPool, history_id: Option<i32>, update: UpdateJobExecutionHistory) {
    let Some(id) = history_id else { return };
    let updated = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|mut conn| job_execution_history::update(&mut conn, id, &update).map_err(|e| e.to_string()));
    if let Err(e) = updated {
        tracing::warn!("could not update history #{}: {}", id, e);
    }
}
