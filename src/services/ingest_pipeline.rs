use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use diesel::pg::PgConnection;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::app::DbPool;
use crate::models::NewStock;
use crate::repositories::{company, file_done};
use crate::services::daily_aggregator;
use crate::services::filename_decoder::{parse_filename, DecodedFile, FilenameParts, MarketDirectory, PEA_ALIAS, PEA_MARKET_ALIAS};
use crate::services::ingest_error::IngestError;
use crate::services::load_coordinator::{FileRows, LoadCoordinator};
use crate::services::snapshot_reader::{normalize_records, read_snapshot, SnapshotRecord};
use crate::services::symbol_registry::SymbolRegistry;
use crate::utils::config::IngestConfig;

/// Which files a run should look at. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IngestRequest {
    /// Market alias as written in filenames; `euronx` also covers `peapme`.
    pub market: Option<String>,
    /// Date prefix: `2023`, `2023-12` or `2023-12-28`.
    pub period: Option<String>,
}

impl IngestRequest {
    pub fn matches(&self, parts: &FilenameParts) -> bool {
        let market_ok = match self.market.as_deref() {
            None | Some("") => true,
            Some(m) => parts.raw_alias == m || (m == PEA_MARKET_ALIAS && parts.raw_alias == PEA_ALIAS),
        };
        let period_ok = match self.period.as_deref() {
            None | Some("") => true,
            Some(p) => parts.date.format("%Y-%m-%d").to_string().starts_with(p),
        };
        market_ok && period_ok
    }

    pub fn describe(&self) -> Option<String> {
        match (self.market.as_deref(), self.period.as_deref()) {
            (None, None) => None,
            (m, p) => Some(format!("market={} period={}", m.unwrap_or("*"), p.unwrap_or("*"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Processed,
    AlreadyDone,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileIngestDetail {
    pub filename: String,
    pub action: FileAction,
    pub rows: usize,
    pub dropped_records: usize,
    pub error: Option<String>,
}

impl FileIngestDetail {
    fn new(filename: &str, action: FileAction, error: Option<String>) -> Self {
        Self {
            filename: filename.to_string(),
            action,
            rows: 0,
            dropped_records: 0,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RollupOutcome {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days_upserted: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub candidates: usize,
    pub processed: usize,
    pub already_done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows_written: usize,
    pub records_dropped: usize,
    pub companies_created: usize,
    pub files: Vec<FileIngestDetail>,
    pub rollups: Vec<RollupOutcome>,
}

impl IngestReport {
    fn record(&mut self, detail: FileIngestDetail) {
        match detail.action {
            FileAction::Processed => self.processed += 1,
            FileAction::AlreadyDone => self.already_done += 1,
            FileAction::Skipped => self.skipped += 1,
            FileAction::Failed => self.failed += 1,
        }
        self.records_dropped += detail.dropped_records;
        self.files.push(detail);
    }

    pub fn rollup_failures(&self) -> usize {
        self.rollups.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Log and drop a directory entry that cannot be inspected.
fn readable<T>(entry: std::io::Result<T>, dir: &Path) -> Option<T> {
    match entry {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("skipping unreadable entry in {:?}: {}", dir, e);
            None
        }
    }
}

/// Snapshot filenames under `root` and its year subdirectories, sorted and
/// deduplicated. Only an unreadable `root` is an error; bad entries and year
/// directories are logged and skipped.
pub fn list_snapshot_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(root)? {
        let Some(entry) = readable(entry, root) else { continue };
        let Some(file_type) = readable(entry.file_type(), root) else { continue };
        let name = entry.file_name().to_string_lossy().into_owned();
        if file_type.is_file() {
            names.insert(name);
        } else if file_type.is_dir() && name.len() == 4 && name.chars().all(|c| c.is_ascii_digit()) {
            let year_dir = entry.path();
            let Some(inner_entries) = readable(std::fs::read_dir(&year_dir), root) else { continue };
            for inner in inner_entries {
                let Some(inner) = readable(inner, &year_dir) else { continue };
                if readable(inner.file_type(), &year_dir).is_some_and(|t| t.is_file()) {
                    names.insert(inner.file_name().to_string_lossy().into_owned());
                }
            }
        }
    }
    Ok(names.into_iter().collect())
}

/// A file that was read and turned into tick rows, waiting to be written.
struct PreparedFile {
    file: DecodedFile,
    rows: Vec<NewStock>,
    dropped: usize,
}

/// Drives one ingestion run: select → read → normalize → resolve → write and
/// mark done → roll up.
pub struct IngestPipeline {
    pool: DbPool,
    config: IngestConfig,
    coordinator: LoadCoordinator,
}

impl IngestPipeline {
    pub fn new(pool: DbPool, config: IngestConfig) -> Self {
        let coordinator = LoadCoordinator::new(pool.clone(), config.write_workers, config.worker_timeout);
        Self {
            pool,
            config,
            coordinator,
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, IngestError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| IngestError::Database(e.to_string()))?;
            f(&mut conn).map_err(|e| IngestError::Database(e.to_string()))
        })
        .await
        .map_err(|e| IngestError::Worker(e.to_string()))?
    }

    pub async fn run(&self, request: &IngestRequest) -> anyhow::Result<IngestReport> {
        let mut report = IngestReport::default();

        let mut candidates: Vec<FilenameParts> = list_snapshot_files(&self.config.data_dir)?
            .into_iter()
            .filter_map(|name| match parse_filename(&name) {
                Ok(parts) => Some(parts),
                Err(e) => {
                    tracing::debug!("ignoring {}: {}", name, e);
                    None
                }
            })
            .filter(|parts| request.matches(parts))
            .collect();
        candidates.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.filename.cmp(&b.filename)));
        report.candidates = candidates.len();

        if candidates.is_empty() {
            tracing::info!("no snapshot files match {:?} in {:?}", request, self.config.data_dir);
            return Ok(report);
        }

        let names: Vec<String> = candidates.iter().map(|p| p.filename.clone()).collect();
        let (done, directory, mut registry) = self
            .with_conn(move |conn| {
                let done = file_done::done_among(conn, &names)?;
                let directory = MarketDirectory::load(conn)?;
                let registry = SymbolRegistry::load(conn)?;
                Ok((done, directory, registry))
            })
            .await?;
        if directory.is_empty() {
            tracing::warn!("markets table is empty, every file will be skipped");
        }
        tracing::debug!("{} markets, {} known companies", directory.len(), registry.len());

        let mut pending = Vec::new();
        for parts in candidates {
            if done.contains(&parts.filename) {
                report.record(FileIngestDetail::new(&parts.filename, FileAction::AlreadyDone, None));
                continue;
            }
            let filename = parts.filename.clone();
            match directory.resolve(parts) {
                Ok(decoded) => pending.push(decoded),
                Err(e) => {
                    let err = IngestError::from(e);
                    if err.is_market_not_found() {
                        tracing::warn!("skipping {}: {}", filename, err);
                    } else {
                        tracing::error!("cannot decode {}: {}", filename, err);
                    }
                    report.record(FileIngestDetail::new(&filename, FileAction::Skipped, Some(err.to_string())));
                }
            }
        }

        tracing::info!(
            "{} candidate files, {} already done, {} to ingest",
            report.candidates,
            report.already_done,
            pending.len()
        );

        for batch in pending.chunks(self.config.batch_files.max(1)) {
            self.ingest_batch(batch, &mut registry, &mut report).await;
        }

        tracing::info!(
            "ingest finished: processed {}, already done {}, skipped {}, failed {}, {} rows, {} new companies",
            report.processed,
            report.already_done,
            report.skipped,
            report.failed,
            report.rows_written,
            report.companies_created
        );
        Ok(report)
    }

    async fn read_batch(&self, batch: &[DecodedFile]) -> Vec<(DecodedFile, Result<Vec<SnapshotRecord>, IngestError>)> {
        let root = self.config.data_dir.clone();
        stream::iter(batch.iter().cloned())
            .map(|file| {
                let root = root.clone();
                async move {
                    let target = file.clone();
                    let result = tokio::task::spawn_blocking(move || read_snapshot(&root, &target))
                        .await
                        .map_err(|e| IngestError::Worker(e.to_string()))
                        .and_then(|r| r.map_err(IngestError::from));
                    (file, result)
                }
            })
            .buffered(self.config.read_workers.max(1))
            .collect()
            .await
    }

    async fn ingest_batch(&self, batch: &[DecodedFile], registry: &mut SymbolRegistry, report: &mut IngestReport) {
        let mut prepared = Vec::with_capacity(batch.len());

        for (file, result) in self.read_batch(batch).await {
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!("skipping {}: {}", file.filename, e);
                    report.record(FileIngestDetail::new(&file.filename, FileAction::Skipped, Some(e.to_string())));
                    continue;
                }
            };

            let (normalized, errors) = normalize_records(records);
            if !errors.is_empty() {
                tracing::warn!("{}: dropped {} records", file.filename, errors.len());
                for e in &errors {
                    tracing::debug!("{}: {}", file.filename, e);
                }
            }

            // ids are only ever allocated here, on the coordinating task
            let rows = normalized
                .into_iter()
                .map(|rec| NewStock {
                    date: rec.timestamp,
                    cid: registry.resolve(&rec.symbol, &rec.display_name, file.market_id, file.pea),
                    value: rec.value,
                    volume: rec.volume,
                })
                .collect();

            prepared.push(PreparedFile {
                file,
                rows,
                dropped: errors.len(),
            });
        }

        if prepared.is_empty() {
            return;
        }

        let new_companies = registry.take_pending();
        if !new_companies.is_empty() {
            let to_insert = new_companies.clone();
            match self.with_conn(move |conn| company::insert_batch(conn, &to_insert)).await {
                Ok(created) => {
                    tracing::info!("registered {} new companies", created);
                    report.companies_created += created;
                }
                Err(e) => {
                    tracing::error!("company registration failed: {}", e);
                    registry.discard(&new_companies);
                    let lost: HashSet<i32> = new_companies.iter().map(|c| c.id).collect();
                    let message = IngestError::Registry(e.to_string()).to_string();
                    prepared.retain(|p| {
                        if p.rows.iter().any(|r| lost.contains(&r.cid)) {
                            report.record(FileIngestDetail {
                                rows: 0,
                                dropped_records: p.dropped,
                                ..FileIngestDetail::new(&p.file.filename, FileAction::Failed, Some(message.clone()))
                            });
                            false
                        } else {
                            true
                        }
                    });
                }
            }
        }

        if prepared.is_empty() {
            return;
        }

        let mut by_name: HashMap<String, PreparedFile> = HashMap::with_capacity(prepared.len());
        let mut files = Vec::with_capacity(prepared.len());
        for mut p in prepared {
            files.push(FileRows {
                filename: p.file.filename.clone(),
                rows: std::mem::take(&mut p.rows),
            });
            by_name.insert(p.file.filename.clone(), p);
        }
        let row_counts: HashMap<String, usize> = files.iter().map(|f| (f.filename.clone(), f.rows.len())).collect();

        let load = self.coordinator.load(files).await;
        report.rows_written += load.report.written();
        let partition_error = (!load.report.all_succeeded()).then(|| {
            IngestError::PartialWriteFailure {
                failed: load.report.failed().count(),
                total: load.report.outcomes.len(),
            }
            .to_string()
        });

        for name in &load.failed {
            if let Some(p) = by_name.get(name) {
                report.record(FileIngestDetail {
                    rows: row_counts.get(name).copied().unwrap_or(0),
                    dropped_records: p.dropped,
                    ..FileIngestDetail::new(name, FileAction::Failed, partition_error.clone())
                });
            }
        }

        let mut rollup_days: Option<(NaiveDate, NaiveDate)> = None;
        for name in &load.completed {
            let Some(p) = by_name.get(name) else { continue };
            let day = p.file.timestamp.date();
            rollup_days = Some(match rollup_days {
                Some((lo, hi)) => (lo.min(day), hi.max(day)),
                None => (day, day),
            });
            report.record(FileIngestDetail {
                rows: row_counts.get(name).copied().unwrap_or(0),
                dropped_records: p.dropped,
                ..FileIngestDetail::new(name, FileAction::Processed, None)
            });
        }

        if let Some((start, end)) = rollup_days {
            let outcome = match daily_aggregator::run_rollup(self.pool.clone(), start, end).await {
                Ok(summary) => RollupOutcome {
                    start,
                    end,
                    days_upserted: Some(summary.days_upserted),
                    error: None,
                },
                Err(e) => {
                    tracing::error!("daystocks rollup {} → {} failed: {}", start, end, e);
                    RollupOutcome {
                        start,
                        end,
                        days_upserted: None,
                        error: Some(IngestError::from(e).to_string()),
                    }
                }
            };
            report.rollups.push(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(name: &str) -> FilenameParts {
        parse_filename(name).unwrap()
    }

    #[test]
    fn request_filters_by_market_and_period() {
        let compa = parts("compA 2023-12-28 14:42:02.133818.bz2");
        let pea = parts("peapme 2023-12-29 17:22:01.359979.bz2");

        let all = IngestRequest::default();
        assert!(all.matches(&compa) && all.matches(&pea));

        let by_market = IngestRequest { market: Some("compA".into()), period: None };
        assert!(by_market.matches(&compa));
        assert!(!by_market.matches(&pea));

        let euronx = IngestRequest { market: Some("euronx".into()), period: None };
        assert!(euronx.matches(&pea));

        let by_day = IngestRequest { market: None, period: Some("2023-12-28".into()) };
        assert!(by_day.matches(&compa));
        assert!(!by_day.matches(&pea));

        let by_month = IngestRequest { market: Some("peapme".into()), period: Some("2023-12".into()) };
        assert!(by_month.matches(&pea));
        assert_eq!(by_month.describe().as_deref(), Some("market=peapme period=2023-12"));
        assert_eq!(all.describe(), None);
    }

    #[test]
    fn lists_root_and_year_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("compA 2024-01-08 09:00:00.1.csv"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("2023")).unwrap();
        std::fs::write(dir.path().join("2023").join("compA 2023-12-28 14:42:02.133818.bz2"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes").join("compA 2022-01-03 09:00:00.1.csv"), "").unwrap();

        let names = list_snapshot_files(dir.path()).unwrap();
        assert_eq!(
            names,
            vec![
                "compA 2023-12-28 14:42:02.133818.bz2".to_string(),
                "compA 2024-01-08 09:00:00.1.csv".to_string(),
            ]
        );
    }

    #[test]
    fn unreadable_entries_are_skipped() {
        let err: std::io::Result<u8> = Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(readable(err, Path::new("data")), None);
        assert_eq!(readable(Ok(7u8), Path::new("data")), Some(7));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_links_do_not_abort_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("compA 2024-01-08 09:00:00.1.csv"), "").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("2025")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.csv"), dir.path().join("compB 2024-01-08 09:00:00.1.csv")).unwrap();

        let names = list_snapshot_files(dir.path()).unwrap();
        assert_eq!(names, vec!["compA 2024-01-08 09:00:00.1.csv".to_string()]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_snapshot_files(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn report_counts_follow_actions() {
        let mut report = IngestReport::default();
        report.record(FileIngestDetail::new("a", FileAction::Processed, None));
        report.record(FileIngestDetail::new("b", FileAction::AlreadyDone, None));
        report.record(FileIngestDetail {
            dropped_records: 2,
            ..FileIngestDetail::new("c", FileAction::Skipped, Some("market 'zzz' not found".into()))
        });
        report.record(FileIngestDetail::new("d", FileAction::Failed, None));
        assert_eq!((report.processed, report.already_done, report.skipped, report.failed), (1, 1, 1, 1));
        assert_eq!(report.records_dropped, 2);
        assert_eq!(report.files.len(), 4);
    }
}
