//! Reads one snapshot file into raw records.
//!
//! Snapshot files are delimited text with a header row. Columns are matched
//! by name, case-insensitively and in any order:
//!
//! | column   | required | notes                                  |
//! |----------|----------|----------------------------------------|
//! | `symbol` | yes      | ticker as published by the exchange    |
//! | `last`   | yes      | raw last price, may carry `(c)`/`(s)`  |
//! | `volume` | yes      | raw volume                             |
//! | `name`   | no       | display name, defaults to the symbol   |
//!
//! The compression is picked from the extension: `bz2`, `gz`, or plain
//! `csv`/`txt`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use chrono::{Datelike, NaiveDateTime};
use flate2::read::GzDecoder;
use thiserror::Error;

use crate::services::filename_decoder::DecodedFile;
use crate::services::normalizer::{normalize_price, normalize_volume, PriceParseError, VolumeParseError};

#[derive(Debug, Error)]
pub enum FileReadError {
    #[error("snapshot '{filename}' not found (tried {tried:?})")]
    NotFound { filename: String, tried: Vec<PathBuf> },
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),
    #[error("unsupported snapshot extension '{0}'")]
    UnsupportedFormat(String),
}

/// One row of a snapshot file, fields untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub display_name: String,
    pub raw_price: String,
    pub volume: String,
}

/// A record whose price and volume went through the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub display_name: String,
    pub value: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("{symbol}: {source}")]
    Price {
        symbol: String,
        #[source]
        source: PriceParseError,
    },
    #[error("{symbol}: {source}")]
    Volume {
        symbol: String,
        #[source]
        source: VolumeParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Bzip2,
    Gzip,
    Plain,
}

fn compression_for(extension: Option<&str>) -> Result<Compression, FileReadError> {
    match extension.map(|e| e.to_ascii_lowercase()) {
        Some(ext) if ext == "bz2" || ext.ends_with(".bz2") => Ok(Compression::Bzip2),
        Some(ext) if ext == "gz" || ext.ends_with(".gz") => Ok(Compression::Gzip),
        Some(ext) if ext == "csv" || ext == "txt" => Ok(Compression::Plain),
        None => Ok(Compression::Plain),
        Some(ext) => Err(FileReadError::UnsupportedFormat(ext)),
    }
}

/// Find the file under `root`, falling back to the `root/<year>/` layout.
pub fn locate(root: &Path, filename: &str, timestamp: NaiveDateTime) -> Result<PathBuf, FileReadError> {
    let direct = root.join(filename);
    if direct.is_file() {
        return Ok(direct);
    }
    let by_year = root.join(timestamp.year().to_string()).join(filename);
    if by_year.is_file() {
        return Ok(by_year);
    }
    Err(FileReadError::NotFound {
        filename: filename.to_string(),
        tried: vec![direct, by_year],
    })
}

/// Locate, decompress and parse the snapshot behind `file`.
pub fn read_snapshot(root: &Path, file: &DecodedFile) -> Result<Vec<SnapshotRecord>, FileReadError> {
    let compression = compression_for(file.extension.as_deref())?;
    let path = locate(root, &file.filename, file.timestamp)?;
    let handle = File::open(&path).map_err(|source| FileReadError::Io {
        path: path.clone(),
        source,
    })?;
    let reader = BufReader::new(handle);

    match compression {
        Compression::Bzip2 => parse_snapshot(BzDecoder::new(reader), file.timestamp),
        Compression::Gzip => parse_snapshot(GzDecoder::new(reader), file.timestamp),
        Compression::Plain => parse_snapshot(reader, file.timestamp),
    }
}

fn column(headers: &csv::ByteRecord, wanted: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| String::from_utf8_lossy(h).trim().eq_ignore_ascii_case(wanted))
}

fn text_field(row: &csv::ByteRecord, index: usize) -> Option<&str> {
    std::str::from_utf8(row.get(index).unwrap_or_default()).ok()
}

/// Parse already-decompressed snapshot text. Delimiter is sniffed from the
/// header line (`,`, `;` or tab).
///
/// Display names are decoded lossily, so a Latin-1 name keeps its row. A row
/// whose symbol, price or volume is not UTF-8 is skipped.
pub fn parse_snapshot<R: Read>(mut input: R, timestamp: NaiveDateTime) -> Result<Vec<SnapshotRecord>, FileReadError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes).map_err(|source| FileReadError::Io {
        path: PathBuf::new(),
        source,
    })?;

    let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let delimiter = [b';', b'\t', b',']
        .into_iter()
        .find(|d| header_line.contains(d))
        .unwrap_or(b',');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let headers = reader.byte_headers()?.clone();
    let symbol_idx = column(&headers, "symbol").ok_or(FileReadError::MissingColumn("symbol"))?;
    let last_idx = column(&headers, "last").ok_or(FileReadError::MissingColumn("last"))?;
    let volume_idx = column(&headers, "volume").ok_or(FileReadError::MissingColumn("volume"))?;
    let name_idx = column(&headers, "name");

    let mut records = Vec::new();
    for row in reader.byte_records() {
        let row = row?;
        let (Some(symbol), Some(raw_price), Some(volume)) = (
            text_field(&row, symbol_idx),
            text_field(&row, last_idx),
            text_field(&row, volume_idx),
        ) else {
            tracing::debug!("skipping non-UTF-8 row at line {:?}", row.position().map(|p| p.line()));
            continue;
        };
        let symbol = symbol.trim();
        if symbol.is_empty() {
            continue;
        }
        let display_name = name_idx
            .and_then(|i| row.get(i))
            .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.to_string());

        records.push(SnapshotRecord {
            timestamp,
            symbol: symbol.to_string(),
            display_name,
            raw_price: raw_price.to_string(),
            volume: volume.to_string(),
        });
    }
    Ok(records)
}

/// Normalize every record; records that fail are returned separately and
/// never reach the tick table.
pub fn normalize_records(records: Vec<SnapshotRecord>) -> (Vec<NormalizedRecord>, Vec<RecordError>) {
    let mut ok = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    for rec in records {
        let value = match normalize_price(&rec.raw_price) {
            Ok(v) => v,
            Err(source) => {
                errors.push(RecordError::Price { symbol: rec.symbol, source });
                continue;
            }
        };
        let volume = match normalize_volume(&rec.volume) {
            Ok(v) => v,
            Err(source) => {
                errors.push(RecordError::Volume { symbol: rec.symbol, source });
                continue;
            }
        };
        ok.push(NormalizedRecord {
            timestamp: rec.timestamp,
            symbol: rec.symbol,
            display_name: rec.display_name,
            value,
            volume,
        });
    }

    (ok, errors)
}
