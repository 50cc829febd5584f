use thiserror::Error;

use crate::services::daily_aggregator::AggregationError;
use crate::services::filename_decoder::FilenameError;
use crate::services::snapshot_reader::{FileReadError, RecordError};

/// Everything that can go wrong while ingesting snapshot files.
///
/// Filename, file-read and record errors are handled where they occur and the
/// run moves on; partition and aggregation errors are surfaced in the run
/// report.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Filename(#[from] FilenameError),
    #[error(transparent)]
    FileRead(#[from] FileReadError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("partial write failure: {failed} of {total} partitions failed")]
    PartialWriteFailure { failed: usize, total: usize },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error("company registration failed: {0}")]
    Registry(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("worker aborted: {0}")]
    Worker(String),
}

impl IngestError {
    pub fn is_market_not_found(&self) -> bool {
        matches!(self, IngestError::Filename(FilenameError::MarketNotFound { .. }))
    }
}
