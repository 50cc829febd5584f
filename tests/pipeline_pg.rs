//! End-to-end ingestion against a real Postgres. Set `TEST_DATABASE_URL` to a
//! scratch database to run it; otherwise every test returns immediately.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use tokio::sync::{Mutex, MutexGuard};

use bourse_ingest::app::{build_pool, DbPool};
use bourse_ingest::repositories::{company, daystock, file_done, stock};
use bourse_ingest::run_migrations;
use bourse_ingest::schema::{daystocks, stocks};
use bourse_ingest::services::daily_aggregator::{self, AggregationError};
use bourse_ingest::services::ingest_pipeline::{FileAction, FileIngestDetail, IngestPipeline, IngestReport, IngestRequest};
use bourse_ingest::utils::config::IngestConfig;

// the tests share one database
static DB: Mutex<()> = Mutex::const_new(());

const TEST_CONSTRAINTS: [(&str, &str); 3] = [
    ("companies", "companies_reject_test"),
    ("stocks", "stocks_value_cap_test"),
    ("daystocks", "daystocks_high_cap_test"),
];

async fn test_pool() -> Option<(DbPool, MutexGuard<'static, ()>)> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let guard = DB.lock().await;
    let pool = build_pool(&url, 8).expect("test pool");
    let mut conn = pool.get().expect("test connection");
    run_migrations(&mut conn).expect("migrations");
    for (table, constraint) in TEST_CONSTRAINTS {
        diesel::sql_query(format!("ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {constraint}"))
            .execute(&mut conn)
            .expect("drop test constraint");
    }
    diesel::sql_query("TRUNCATE stocks, daystocks, file_done, companies, job_execution_history")
        .execute(&mut conn)
        .expect("truncate");
    Some((pool, guard))
}

fn sql(pool: &DbPool, statement: &str) {
    diesel::sql_query(statement).execute(&mut pool.get().unwrap()).unwrap();
}

fn write_snapshot(dir: &Path, name: &str, rows: &[(&str, &str, &str, &str)]) {
    let mut body = String::from("symbol;name;last;volume\n");
    for (symbol, name, last, volume) in rows {
        body.push_str(&format!("{symbol};{name};{last};{volume}\n"));
    }
    std::fs::write(dir.join(name), body).unwrap();
}

fn config(dir: &Path) -> IngestConfig {
    IngestConfig {
        data_dir: dir.to_path_buf(),
        write_workers: 3,
        read_workers: 2,
        worker_timeout: Duration::from_secs(30),
        batch_files: 2,
        cron: None,
    }
}

fn stock_count(pool: &DbPool) -> i64 {
    stock::count_all(&mut pool.get().unwrap()).unwrap()
}

fn rows_at(pool: &DbPool, at: NaiveDateTime) -> i64 {
    stocks::table
        .filter(stocks::date.eq(at))
        .count()
        .get_result(&mut pool.get().unwrap())
        .unwrap()
}

fn daystocks_on(pool: &DbPool, day: NaiveDate) -> i64 {
    daystocks::table
        .filter(daystocks::date.eq(day))
        .count()
        .get_result(&mut pool.get().unwrap())
        .unwrap()
}

fn is_done(pool: &DbPool, name: &str) -> bool {
    file_done::is_done(&mut pool.get().unwrap(), name).unwrap()
}

fn detail<'a>(report: &'a IngestReport, name: &str) -> &'a FileIngestDetail {
    report.files.iter().find(|f| f.filename == name).unwrap()
}

fn at(day: u32, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("2024-01-{day:02} {time}"), "%Y-%m-%d %H:%M:%S%.f").unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ingest_is_idempotent_and_rolls_up() {
    let Some((pool, _db)) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let prices = [("09:00:00", "10"), ("10:00:00", "12,00(c)"), ("11:00:00", " 9,0 "), ("12:00:00", "11")];
    for (time, price) in prices {
        write_snapshot(
            dir.path(),
            &format!("compA 2024-01-08 {time}.000001.csv"),
            &[("1rPAIR", "Air Liquide", price, "100"), ("1rPBN", "Danone", "55,2", "")],
        );
    }
    write_snapshot(dir.path(), "zzz 2024-01-08 10:30:00.000001.csv", &[("1rPZZZ", "Nowhere", "1", "1")]);
    std::fs::create_dir_all(dir.path().join("2024")).unwrap();
    write_snapshot(
        &dir.path().join("2024"),
        "peapme 2024-01-08 13:00:00.000001.csv",
        &[("1rPALPME", "Small cap", "3,5", "7"), ("1rPBAD", "Broken", "n/a", "1")],
    );
    std::fs::write(dir.path().join("README.txt"), "not a snapshot").unwrap();

    let pipeline = IngestPipeline::new(pool.clone(), config(dir.path()));

    let first = pipeline.run(&IngestRequest::default()).await.unwrap();
    assert_eq!(first.candidates, 6);
    assert_eq!(first.processed, 5);
    assert_eq!(first.skipped, 1);
    assert_eq!(first.failed, 0);
    assert_eq!(first.records_dropped, 1);
    assert_eq!(first.companies_created, 3);
    assert_eq!(first.rows_written, 9);
    let zzz = detail(&first, "zzz 2024-01-08 10:30:00.000001.csv");
    assert_eq!(zzz.action, FileAction::Skipped);
    assert!(zzz.error.as_deref().unwrap().contains("zzz"));
    assert_eq!(stock_count(&pool), 9);

    let second = pipeline.run(&IngestRequest::default()).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.already_done, 5);
    assert_eq!(second.skipped, 1);
    assert_eq!(stock_count(&pool), 9);

    let filtered = pipeline
        .run(&IngestRequest { market: Some("compA".into()), period: Some("2024-01".into()) })
        .await
        .unwrap();
    assert_eq!(filtered.candidates, 4);
    assert_eq!(filtered.already_done, 4);
    assert_eq!(stock_count(&pool), 9);

    let mut conn = pool.get().unwrap();
    let air = company::find_by_symbol(&mut conn, "1rPAIR").unwrap().unwrap();
    assert!(!air.pea);
    let small = company::find_by_symbol(&mut conn, "1rPALPME").unwrap().unwrap();
    assert!(small.pea);
    assert_ne!(air.id, small.id);
    assert!(company::find_by_symbol(&mut conn, "1rPZZZ").unwrap().is_none());
    assert!(file_done::is_done(&mut conn, "compA 2024-01-08 09:00:00.000001.csv").unwrap());
    assert!(!file_done::is_done(&mut conn, "zzz 2024-01-08 10:30:00.000001.csv").unwrap());

    let day = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
    let ohlcv = daystock::find_by_pk(&mut conn, day, air.id).unwrap().unwrap();
    assert_eq!((ohlcv.open, ohlcv.close, ohlcv.high, ohlcv.low, ohlcv.volume), (10.0, 11.0, 12.0, 9.0, 400));
    drop(conn);

    let again = daily_aggregator::run_rollup(pool.clone(), day, day).await.unwrap();
    assert_eq!(again.ticks, 9);
    assert_eq!(again.days_upserted, 3);

    let inverted = daily_aggregator::run_rollup(pool.clone(), day, day.pred_opt().unwrap()).await;
    assert!(matches!(inverted, Err(AggregationError::InvalidRange { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn long_company_name_does_not_fail_its_batch() {
    let Some((pool, _db)) = test_pool().await else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let long_name = "Compagnie Generale ".repeat(11);
    let long_name = &long_name[..200];
    let long_symbol = format!("1rP{}", "X".repeat(45));
    let first = "compA 2024-01-09 09:00:00.000001.csv";
    let second = "compB 2024-01-09 09:00:00.000001.csv";
    write_snapshot(dir.path(), first, &[(long_symbol.as_str(), long_name, "10", "1")]);
    write_snapshot(dir.path(), second, &[("1rPSHORT", "Short", "20", "2")]);

    let report = IngestPipeline::new(pool.clone(), config(dir.path()))
        .run(&IngestRequest::default())
        .await
        .unwrap();

    assert_eq!(report.processed, 2, "{:?}", report.files);
    assert_eq!(report.failed, 0);
    assert_eq!(report.companies_created, 2);
    let stored = company::find_by_symbol(&mut pool.get().unwrap(), &long_symbol).unwrap().unwrap();
    assert_eq!(stored.name.len(), 200);
    assert!(is_done(&pool, first) && is_done(&pool, second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn files_sharing_a_timestamp_keep_each_others_rows() {
    let Some((pool, _db)) = test_pool().await else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path(), "compA 2024-01-10 09:00:00.000001.csv", &[("1rPSHARED", "Shared", "10", "1")]);
    write_snapshot(dir.path(), "peapme 2024-01-10 09:00:00.000001.csv", &[("1rPSHARED", "Shared", "11", "2")]);

    let mut cfg = config(dir.path());
    cfg.batch_files = 1;
    let report = IngestPipeline::new(pool.clone(), cfg).run(&IngestRequest::default()).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.companies_created, 1);
    assert_eq!(rows_at(&pool, at(10, "09:00:00.000001")), 2);
    assert_eq!(stock_count(&pool), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_registration_fails_only_the_files_that_need_it() {
    let Some((pool, _db)) = test_pool().await else {
        return;
    };

    let seed = tempfile::tempdir().unwrap();
    write_snapshot(seed.path(), "compA 2024-01-11 09:00:00.000001.csv", &[("1rPKNOWN", "Known", "10", "1")]);
    let seeded = IngestPipeline::new(pool.clone(), config(seed.path()))
        .run(&IngestRequest::default())
        .await
        .unwrap();
    assert_eq!(seeded.processed, 1);

    sql(&pool, "ALTER TABLE companies ADD CONSTRAINT companies_reject_test CHECK (symbol <> '1rPREJECT')");

    let dir = tempfile::tempdir().unwrap();
    let known = "compA 2024-01-11 10:00:00.000001.csv";
    let rejected = "compB 2024-01-11 10:00:00.000001.csv";
    write_snapshot(dir.path(), known, &[("1rPKNOWN", "Known", "11", "1")]);
    write_snapshot(dir.path(), rejected, &[("1rPREJECT", "Rejected", "5", "1")]);
    let pipeline = IngestPipeline::new(pool.clone(), config(dir.path()));

    let report = pipeline.run(&IngestRequest::default()).await.unwrap();
    assert_eq!(detail(&report, known).action, FileAction::Processed);
    assert_eq!(detail(&report, rejected).action, FileAction::Failed);
    assert_eq!(report.companies_created, 0);
    assert!(is_done(&pool, known));
    assert!(!is_done(&pool, rejected));
    assert!(company::find_by_symbol(&mut pool.get().unwrap(), "1rPREJECT").unwrap().is_none());
    assert_eq!(rows_at(&pool, at(11, "10:00:00.000001")), 1);

    sql(&pool, "ALTER TABLE companies DROP CONSTRAINT companies_reject_test");
    let retry = pipeline.run(&IngestRequest::default()).await.unwrap();
    assert_eq!(retry.already_done, 1);
    assert_eq!(detail(&retry, rejected).action, FileAction::Processed);
    assert_eq!(retry.companies_created, 1);
    assert_eq!(rows_at(&pool, at(11, "10:00:00.000001")), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_partition_is_not_marked_done() {
    let Some((pool, _db)) = test_pool().await else {
        return;
    };

    sql(&pool, "ALTER TABLE stocks ADD CONSTRAINT stocks_value_cap_test CHECK (value < 1000000)");

    let dir = tempfile::tempdir().unwrap();
    let good = "compA 2024-01-12 09:00:00.000001.csv";
    let bad = "compA 2024-01-12 10:00:00.000001.csv";
    write_snapshot(dir.path(), good, &[("1rPAIR", "Air Liquide", "10", "1")]);
    write_snapshot(dir.path(), bad, &[("1rPAIR", "Air Liquide", "11", "1"), ("1rPHUGE", "Huge", "5000000", "1")]);

    let mut cfg = config(dir.path());
    cfg.write_workers = 1;
    cfg.batch_files = 1;
    let report = IngestPipeline::new(pool.clone(), cfg).run(&IngestRequest::default()).await.unwrap();

    assert_eq!(detail(&report, good).action, FileAction::Processed);
    let failed = detail(&report, bad);
    assert_eq!(failed.action, FileAction::Failed);
    assert!(failed.error.is_some());
    assert!(is_done(&pool, good));
    assert!(!is_done(&pool, bad));
    assert_eq!(rows_at(&pool, at(12, "10:00:00.000001")), 0);
    assert_eq!(stock_count(&pool), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_rollup_commits_nothing() {
    let Some((pool, _db)) = test_pool().await else {
        return;
    };

    sql(&pool, "ALTER TABLE daystocks ADD CONSTRAINT daystocks_high_cap_test CHECK (high < 100)");

    let dir = tempfile::tempdir().unwrap();
    let name = "compA 2024-01-15 09:00:00.000001.csv";
    write_snapshot(dir.path(), name, &[("1rPCHEAP", "Cheap", "10", "1"), ("1rPDEAR", "Dear", "500", "1")]);

    let report = IngestPipeline::new(pool.clone(), config(dir.path()))
        .run(&IngestRequest::default())
        .await
        .unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    assert_eq!(report.processed, 1);
    assert!(is_done(&pool, name));
    assert_eq!(report.rollup_failures(), 1);
    assert_eq!(daystocks_on(&pool, day), 0);

    let direct = daily_aggregator::run_rollup(pool.clone(), day, day).await;
    assert!(direct.is_err());
    assert_eq!(daystocks_on(&pool, day), 0);

    sql(&pool, "ALTER TABLE daystocks DROP CONSTRAINT daystocks_high_cap_test");
    let summary = daily_aggregator::run_rollup(pool.clone(), day, day).await.unwrap();
    assert_eq!(summary.days_upserted, 2);
    assert_eq!(daystocks_on(&pool, day), 2);
}
