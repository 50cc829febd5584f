use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::schema::job_execution_history;

/// Final state of a job run as stored in `job_execution_history.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }

    /// Success when nothing failed, partial when some work still went through.
    pub fn from_counts(success: usize, failed: usize) -> Self {
        if failed == 0 {
            JobStatus::Success
        } else if success > 0 {
            JobStatus::Partial
        } else {
            JobStatus::Failed
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Clone, Debug)]
#[diesel(table_name = job_execution_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobExecutionHistory {
    pub id: i32,
    pub job_name: String,
    pub status: String,
    pub scope: Option<String>,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub total_count: i32,
    pub success_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub details: Option<Value>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = job_execution_history)]
pub struct NewJobExecutionHistory {
    pub job_name: String,
    pub status: String,
    pub scope: Option<String>,
    pub started_at: NaiveDateTime,
}

impl NewJobExecutionHistory {
    pub fn running(job_name: &str, scope: Option<String>, started_at: NaiveDateTime) -> Self {
        Self {
            job_name: job_name.to_string(),
            status: JobStatus::Running.as_str().to_string(),
            scope,
            started_at,
        }
    }
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = job_execution_history)]
pub struct UpdateJobExecutionHistory {
    pub status: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
    pub total_count: Option<i32>,
    pub success_count: Option<i32>,
    pub failed_count: Option<i32>,
    pub skipped_count: Option<i32>,
    pub details: Option<Value>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
}

impl UpdateJobExecutionHistory {
    /// Terminal update for a run that started at `started_at`.
    pub fn finished(
        status: JobStatus,
        started_at: NaiveDateTime,
        completed_at: NaiveDateTime,
    ) -> Self {
        Self {
            status: Some(status.as_str().to_string()),
            completed_at: Some(completed_at),
            duration_ms: Some((completed_at - started_at).num_milliseconds()),
            ..Default::default()
        }
    }

    pub fn with_counts(mut self, total: usize, success: usize, failed: usize, skipped: usize) -> Self {
        self.total_count = Some(total as i32);
        self.success_count = Some(success as i32);
        self.failed_count = Some(failed as i32);
        self.skipped_count = Some(skipped as i32);
        self
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.details = details;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}
