use chrono_tz::Europe::Paris;
use thiserror::Error;
use tokio_cron_scheduler::{JobBuilder, JobScheduler};

use crate::app::AppState;
use crate::models::{JobStatus, UpdateJobExecutionHistory};
use crate::scheduler::{record_finish, record_start};
use crate::services::ingest_pipeline::{IngestPipeline, IngestReport, IngestRequest};
use crate::utils::ws_broadcast::broadcast_task_status;

pub const INGEST_JOB: &str = "ingest";

#[derive(Debug, Error)]
#[error("an ingestion run is already in progress")]
pub struct IngestBusy;

pub async fn create_ingest_job(scheduler: &JobScheduler, state: AppState, cron: &str) -> anyhow::Result<()> {
    let job = JobBuilder::new()
        .with_timezone(Paris)
        .with_cron_job_type()
        .with_schedule(cron)?
        .with_run_async(Box::new(move |_uuid, _l| {
            let state = state.clone();
            Box::pin(async move {
                match try_run_ingest_task(&state, IngestRequest::default()).await {
                    Ok(_) => {}
                    Err(e) if e.is::<IngestBusy>() => {
                        tracing::warn!("scheduled ingestion skipped: {}", e);
                    }
                    Err(e) => tracing::error!("scheduled ingestion failed: {}", e),
                }
            })
        }))
        .build()?;

    scheduler.add(job).await?;
    tracing::info!("ingestion job registered ({} Europe/Paris)", cron);
    Ok(())
}

/// Manual ingestion run. Waits for an in-flight run to finish first.
pub async fn run_ingest_task(state: &AppState, request: IngestRequest) -> anyhow::Result<IngestReport> {
    let _guard = match state.ingest_lock.try_lock() {
        Ok(guard) => guard,
        Err(_) => {
            tracing::info!("an ingestion run is in progress, waiting for it to finish");
            state.ingest_lock.lock().await
        }
    };
    run_locked(state, request).await
}

/// Scheduled ingestion run. Fails fast with [`IngestBusy`] when another run
/// holds the lock.
pub async fn try_run_ingest_task(state: &AppState, request: IngestRequest) -> anyhow::Result<IngestReport> {
    let _guard = state.ingest_lock.try_lock().map_err(|_| IngestBusy)?;
    run_locked(state, request).await
}

async fn run_locked(state: &AppState, request: IngestRequest) -> anyhow::Result<IngestReport> {
    let scope = request.describe();
    tracing::info!("ingestion started ({})", scope.as_deref().unwrap_or("all files"));

    let started_at = chrono::Local::now().naive_local();
    let history_id = record_start(&state.db_pool, INGEST_JOB, scope.clone(), started_at);
    broadcast_task_status(&state.ws_sender, INGEST_JOB, JobStatus::Running.as_str(), scope.as_deref());

    let pipeline = IngestPipeline::new(state.db_pool.clone(), state.ingest_config.clone());
    let result = pipeline.run(&request).await;
    let completed_at = chrono::Local::now().naive_local();

    let status = match &result {
        Ok(report) => {
            let failed = report.failed + report.rollup_failures();
            let status = JobStatus::from_counts(report.processed + report.already_done, failed);
            let update = UpdateJobExecutionHistory::finished(status, started_at, completed_at)
                .with_counts(report.candidates, report.processed, failed, report.already_done + report.skipped)
                .with_details(serde_json::to_value(report).ok());
            record_finish(&state.db_pool, history_id, update);
            status
        }
        Err(e) => {
            tracing::error!("ingestion aborted: {}", e);
            let update = UpdateJobExecutionHistory::finished(JobStatus::Failed, started_at, completed_at).with_error(e.to_string());
            record_finish(&state.db_pool, history_id, update);
            JobStatus::Failed
        }
    };

    broadcast_task_status(&state.ws_sender, INGEST_JOB, status.as_str(), scope.as_deref());
    result
}
