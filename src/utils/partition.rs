use std::fmt::Display;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Split `items` into at most `parts` contiguous, disjoint chunks whose sizes
/// differ by at most one. Order is preserved and nothing is dropped.
pub fn split_contiguous<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let len = items.len();
    if len == 0 {
        return Vec::new();
    }
    let parts = parts.clamp(1, len);
    let base = len / parts;
    let extra = len % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut iter = items.into_iter();
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionOutcome {
    pub index: usize,
    /// Positions of this partition's items in the input.
    pub range: Range<usize>,
    pub written: usize,
    pub error: Option<String>,
}

impl PartitionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PartitionReport {
    pub outcomes: Vec<PartitionOutcome>,
}

impl PartitionReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(PartitionOutcome::succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PartitionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn written(&self) -> usize {
        self.outcomes.iter().map(|o| o.written).sum()
    }

    /// Outcome of the partition holding input position `position`.
    pub fn outcome_of(&self, position: usize) -> Option<&PartitionOutcome> {
        self.outcomes.iter().find(|o| o.range.contains(&position))
    }
}

/// Fan `items` out over `parts` blocking workers and wait for all of them.
///
/// `work` receives the partition index, its owned chunk and the deadline it
/// must finish by, and returns the number of items it wrote. Workers are
/// expected to give up on their own once the deadline passes; the join waits
/// `grace` past it for them to do so. A failing or panicking worker only fails
/// its own partition. A worker still running after the grace period is
/// reported failed.
pub async fn run_partitioned<T, F, E>(
    items: Vec<T>,
    parts: usize,
    timeout: Duration,
    grace: Duration,
    work: F,
) -> PartitionReport
where
    T: Send + 'static,
    F: Fn(usize, Vec<T>, Instant) -> Result<usize, E> + Send + Sync + 'static,
    E: Display,
{
    let work = Arc::new(work);
    let deadline = Instant::now() + timeout;
    let join_deadline = tokio::time::Instant::from_std(deadline + grace);

    let mut offset = 0;
    let mut handles = Vec::new();
    for (index, chunk) in split_contiguous(items, parts).into_iter().enumerate() {
        let range = offset..offset + chunk.len();
        offset = range.end;
        let work = Arc::clone(&work);
        let handle = tokio::task::spawn_blocking(move || work(index, chunk, deadline).map_err(|e| e.to_string()));
        handles.push((index, range, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, range, handle) in handles {
        let (written, error) = match tokio::time::timeout_at(join_deadline, handle).await {
            Ok(Ok(Ok(written))) => (written, None),
            Ok(Ok(Err(e))) => (0, Some(e)),
            Ok(Err(join_err)) => (0, Some(format!("worker aborted: {join_err}"))),
            Err(_) => {
                tracing::error!("partition {} ignored its deadline and is still running", index);
                (0, Some(format!("worker did not stop within {}s", (timeout + grace).as_secs())))
            }
        };
        if let Some(e) = &error {
            tracing::warn!("partition {} ({} items) failed: {}", index, range.len(), e);
        }
        outcomes.push(PartitionOutcome {
            index,
            range,
            written,
            error,
        });
    }

    PartitionReport { outcomes }
}
