use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::JobExecutionHistory;
use crate::services::daily_aggregator::RollupSummary;
use crate::services::ingest_pipeline::IngestReport;

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub schedule: String,
    pub enabled: bool,
}

#[derive(Deserialize, Debug)]
pub struct HistoryQueryParams {
    pub job_name: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl HistoryQueryParams {
    /// 1-based page and a page size capped at 100.
    pub fn paging(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(20).clamp(1, 100);
        (page, page_size)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionHistoryResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<JobExecutionHistoryItem>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionHistoryItem {
    pub id: i32,
    pub job_name: String,
    pub status: String,
    pub scope: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub total_count: i32,
    pub success_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub details: Option<Value>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
}

impl From<JobExecutionHistory> for JobExecutionHistoryItem {
    fn from(history: JobExecutionHistory) -> Self {
        Self {
            id: history.id,
            job_name: history.job_name,
            status: history.status,
            scope: history.scope,
            started_at: history.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            completed_at: history.completed_at.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            total_count: history.total_count,
            success_count: history.success_count,
            failed_count: history.failed_count,
            skipped_count: history.skipped_count,
            details: history.details,
            error_message: history.error_message,
            duration_ms: history.duration_ms,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct TriggerRollupRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Serialize, Debug)]
pub struct TriggerIngestResponse {
    pub success: bool,
    pub message: String,
    pub report: IngestReport,
}

impl From<IngestReport> for TriggerIngestResponse {
    fn from(report: IngestReport) -> Self {
        let failed = report.failed + report.rollup_failures();
        Self {
            success: failed == 0,
            message: format!(
                "{} candidate files: {} processed, {} already done, {} skipped, {} failed; {} rows written",
                report.candidates, report.processed, report.already_done, report.skipped, failed, report.rows_written
            ),
            report,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct TriggerRollupResponse {
    pub success: bool,
    pub message: String,
    pub summary: RollupSummary,
}

impl From<RollupSummary> for TriggerRollupResponse {
    fn from(summary: RollupSummary) -> Self {
        Self {
            success: true,
            message: format!(
                "daystocks {} → {}: {} ticks, {} rows upserted",
                summary.start, summary.end, summary.ticks, summary.days_upserted
            ),
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_bounds() {
        let q = HistoryQueryParams { job_name: None, status: None, page: None, page_size: None };
        assert_eq!(q.paging(), (1, 20));
        let q = HistoryQueryParams { job_name: None, status: None, page: Some(0), page_size: Some(1000) };
        assert_eq!(q.paging(), (1, 100));
    }

    #[test]
    fn ingest_response_counts_rollup_failures() {
        let report = IngestReport { candidates: 2, processed: 2, ..Default::default() };
        let resp = TriggerIngestResponse::from(report);
        assert!(resp.success);
        assert!(resp.message.starts_with("2 candidate files: 2 processed"));
    }
}
