use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api_models::scheduler::{
    HistoryQueryParams, JobExecutionHistoryItem, JobExecutionHistoryResponse, JobInfo, TriggerIngestResponse,
    TriggerRollupRequest, TriggerRollupResponse,
};
use crate::app::AppState;
use crate::handler::error::AppError;
use crate::repositories::job_execution_history;
use crate::scheduler::ingest_job::{self, INGEST_JOB};
use crate::scheduler::rollup_job::{self, ROLLUP_JOB};
use crate::services::daily_aggregator::AggregationError;
use crate::services::ingest_pipeline::IngestRequest;

/// Run an ingestion now, after any run already in progress. The body is
/// optional; an empty one ingests every pending file.
pub async fn trigger_ingest(
    State(state): State<AppState>,
    body: Option<Json<IngestRequest>>,
) -> Result<Json<TriggerIngestResponse>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    tracing::info!("manual ingestion requested: {:?}", request);

    match ingest_job::run_ingest_task(&state, request).await {
        Ok(report) => Ok(Json(report.into())),
        Err(e) => {
            tracing::error!("manual ingestion failed: {}", e);
            Err(AppError::InternalServerError(e.to_string()))
        }
    }
}

pub async fn trigger_rollup(
    State(state): State<AppState>,
    Json(req): Json<TriggerRollupRequest>,
) -> Result<Json<TriggerRollupResponse>, AppError> {
    tracing::info!("manual rollup requested: {} → {}", req.start_date, req.end_date);

    match rollup_job::run_rollup_task(&state, req.start_date, req.end_date).await {
        Ok(summary) => Ok(Json(summary.into())),
        Err(e) => match e.downcast_ref::<AggregationError>() {
            Some(AggregationError::InvalidRange { .. }) => Err(AppError::BadRequest(e.to_string())),
            _ => Err(AppError::InternalServerError(e.to_string())),
        },
    }
}

pub async fn get_job_list(State(state): State<AppState>) -> Json<Vec<JobInfo>> {
    let cron = state.ingest_config.cron.clone();
    Json(vec![
        JobInfo {
            name: INGEST_JOB.to_string(),
            display_name: "Snapshot ingestion".to_string(),
            description: format!(
                "Load pending snapshot files from {} into stocks, then roll up daystocks",
                state.ingest_config.data_dir.display()
            ),
            enabled: cron.is_some(),
            schedule: cron.map(|c| format!("{c} (Europe/Paris)")).unwrap_or_else(|| "manual".to_string()),
        },
        JobInfo {
            name: ROLLUP_JOB.to_string(),
            display_name: "Daily rollup".to_string(),
            description: "Recompute daystocks OHLCV for a date range".to_string(),
            schedule: "manual (also runs after each ingestion)".to_string(),
            enabled: true,
        },
    ])
}

pub async fn get_execution_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQueryParams>,
) -> Result<Json<JobExecutionHistoryResponse>, AppError> {
    let (page, page_size) = params.paging();
    let mut conn = state.db_pool.get()?;
    let (items, total) =
        job_execution_history::paginate(&mut conn, params.job_name, params.status, page, page_size)?;

    Ok(Json(JobExecutionHistoryResponse {
        total,
        page,
        page_size,
        items: items.into_iter().map(JobExecutionHistoryItem::from).collect(),
    }))
}

pub async fn get_execution_detail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<JobExecutionHistoryItem>, AppError> {
    let mut conn = state.db_pool.get()?;
    job_execution_history::find_by_id(&mut conn, id)?
        .map(|h| Json(h.into()))
        .ok_or(AppError::NotFound)
}

pub async fn get_latest_execution(
    State(state): State<AppState>,
    Path(job_name): Path<String>,
) -> Result<Json<JobExecutionHistoryItem>, AppError> {
    let mut conn = state.db_pool.get()?;
    job_execution_history::find_latest_by_job_name(&mut conn, &job_name)?
        .map(|h| Json(h.into()))
        .ok_or(AppError::NotFound)
}
