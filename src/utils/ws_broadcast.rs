use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Pushed to every `/ws` subscriber when a job changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusMessage {
    pub job_name: String,
    pub status: String,
    /// Run scope (market/period filter or date range), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub timestamp: i64,
}

pub type TaskStatusSender = broadcast::Sender<TaskStatusMessage>;

pub fn create_broadcast_channel() -> TaskStatusSender {
    let (tx, _rx) = broadcast::channel(100);
    tx
}

/// Fire and forget; a send with no subscribers is not an error.
pub fn broadcast_task_status(sender: &TaskStatusSender, job_name: &str, status: &str, scope: Option<&str>) {
    let msg = TaskStatusMessage {
        job_name: job_name.to_string(),
        status: status.to_string(),
        scope: scope.map(str::to_string),
        timestamp: chrono::Utc::now().timestamp_millis(),
    };
    let receivers = sender.send(msg).unwrap_or(0);
    tracing::debug!("task status {} -> {} ({} listeners)", job_name, status, receivers);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_status() {
        let tx = create_broadcast_channel();
        let mut rx = tx.subscribe();
        broadcast_task_status(&tx, "ingest", "running", Some("market=compA period=*"));
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.job_name, "ingest");
        assert_eq!(msg.status, "running");
        assert_eq!(msg.scope.as_deref(), Some("market=compA period=*"));
    }

    #[test]
    fn no_subscribers_is_fine() {
        let tx = create_broadcast_channel();
        broadcast_task_status(&tx, "daystocks_rollup", "success", None);
    }
}
