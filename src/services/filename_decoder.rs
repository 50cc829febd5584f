use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::pg::PgConnection;
use thiserror::Error;

use crate::models::Market;
use crate::repositories::market;

/// The PEA-PME segment is published under its own alias but belongs to Euronext Growth.
pub const PEA_ALIAS: &str = "peapme";
pub const PEA_MARKET_ALIAS: &str = "euronx";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilenameError {
    #[error("malformed snapshot filename '{0}'")]
    Malformed(String),
    #[error("market '{alias}' not found for '{filename}'")]
    MarketNotFound { alias: String, filename: String },
}

/// Pieces of `<alias> <YYYY-MM-DD> <HH:MM:SS.ffffff>.<ext>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameParts {
    pub filename: String,
    /// Alias as written in the filename (`peapme` stays `peapme`).
    pub raw_alias: String,
    pub date: NaiveDate,
    pub timestamp: NaiveDateTime,
    pub extension: Option<String>,
}

/// A snapshot filename resolved against the market table.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    pub filename: String,
    pub market_alias: String,
    pub market_id: i32,
    pub pea: bool,
    pub timestamp: NaiveDateTime,
    pub extension: Option<String>,
}

/// Split a snapshot filename. Directory components are ignored.
///
/// The fractional seconds are optional so that older captures named
/// `compA 2020-01-02 09:00:01.bz2` still decode.
pub fn parse_filename(input: &str) -> Result<FilenameParts, FilenameError> {
    let filename = Path::new(input)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(input)
        .to_string();
    let malformed = || FilenameError::Malformed(filename.clone());

    let mut fields = filename.split_whitespace();
    let (raw_alias, date_str, rest) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(a), Some(d), Some(r), None) => (a, d, r),
        _ => return Err(malformed()),
    };

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| malformed())?;

    let mut pieces = rest.split('.');
    let hms = pieces.next().ok_or_else(malformed)?;
    let mut time = NaiveTime::parse_from_str(hms, "%H:%M:%S").map_err(|_| malformed())?;

    let mut remaining: Vec<&str> = pieces.collect();
    if let Some(first) = remaining.first() {
        if !first.is_empty() && first.len() <= 9 && first.chars().all(|c| c.is_ascii_digit()) {
            let frac = format!("{hms}.{first}");
            time = NaiveTime::parse_from_str(&frac, "%H:%M:%S%.f").map_err(|_| malformed())?;
            remaining.remove(0);
        }
    }
    if remaining.iter().any(|p| p.is_empty()) {
        return Err(malformed());
    }
    let extension = if remaining.is_empty() {
        None
    } else {
        Some(remaining.join("."))
    };

    Ok(FilenameParts {
        raw_alias: raw_alias.to_string(),
        date,
        timestamp: date.and_time(time),
        extension,
        filename,
    })
}

/// Alias → market id lookup, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct MarketDirectory {
    by_alias: HashMap<String, i32>,
}

impl MarketDirectory {
    pub fn from_markets<I: IntoIterator<Item = Market>>(markets: I) -> Self {
        Self {
            by_alias: markets.into_iter().map(|m| (m.alias, m.id)).collect(),
        }
    }

    pub fn load(conn: &mut PgConnection) -> Result<Self, diesel::result::Error> {
        Ok(Self::from_markets(market::list_all(conn)?))
    }

    pub fn market_id(&self, alias: &str) -> Option<i32> {
        self.by_alias.get(alias).copied()
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }

    /// Resolve already-split filename parts to a market.
    pub fn resolve(&self, parts: FilenameParts) -> Result<DecodedFile, FilenameError> {
        let (market_alias, pea) = if parts.raw_alias == PEA_ALIAS {
            (PEA_MARKET_ALIAS.to_string(), true)
        } else {
            (parts.raw_alias.clone(), false)
        };

        let market_id = self
            .market_id(&market_alias)
            .ok_or_else(|| FilenameError::MarketNotFound {
                alias: parts.raw_alias.clone(),
                filename: parts.filename.clone(),
            })?;

        Ok(DecodedFile {
            filename: parts.filename,
            market_alias,
            market_id,
            pea,
            timestamp: parts.timestamp,
            extension: parts.extension,
        })
    }

    pub fn decode(&self, filename: &str) -> Result<DecodedFile, FilenameError> {
        self.resolve(parse_filename(filename)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn directory() -> MarketDirectory {
        MarketDirectory::from_markets(vec![
            Market { id: 8, alias: "compA".to_string() },
            Market { id: 9, alias: "compB".to_string() },
            Market { id: 10, alias: "euronx".to_string() },
        ])
    }

    #[test]
    fn decodes_regular_filename() {
        let decoded = directory().decode("compA 2023-12-28 14:42:02.133818.bz2").unwrap();
        assert_eq!(decoded.market_alias, "compA");
        assert_eq!(decoded.market_id, 8);
        assert!(!decoded.pea);
        assert_eq!(decoded.timestamp.date(), NaiveDate::from_ymd_opt(2023, 12, 28).unwrap());
        assert_eq!(decoded.timestamp.hour(), 14);
        assert_eq!(decoded.timestamp.second(), 2);
        assert_eq!(decoded.timestamp.nanosecond(), 133_818_000);
        assert_eq!(decoded.extension.as_deref(), Some("bz2"));
    }

    #[test]
    fn peapme_maps_to_euronx_with_pea_flag() {
        let decoded = directory().decode("peapme 2023-12-29 17:22:01.359979.bz2").unwrap();
        assert_eq!(decoded.market_alias, "euronx");
        assert_eq!(decoded.market_id, 10);
        assert!(decoded.pea);
        assert_eq!(decoded.filename, "peapme 2023-12-29 17:22:01.359979.bz2");
    }

    #[test]
    fn unknown_alias_is_market_not_found() {
        let err = directory().decode("zzz 2023-12-28 14:42:02.133818.bz2").unwrap_err();
        assert_eq!(
            err,
            FilenameError::MarketNotFound {
                alias: "zzz".to_string(),
                filename: "zzz 2023-12-28 14:42:02.133818.bz2".to_string(),
            }
        );
    }

    #[test]
    fn legacy_names_without_fraction() {
        let parts = parse_filename("compB 2020-01-02 09:00:01.bz2").unwrap();
        assert_eq!(parts.timestamp.nanosecond(), 0);
        assert_eq!(parts.extension.as_deref(), Some("bz2"));

        let parts = parse_filename("data/boursorama/2020/compB 2020-01-02 09:00:01.5").unwrap();
        assert_eq!(parts.filename, "compB 2020-01-02 09:00:01.5");
        assert_eq!(parts.extension, None);
        assert_eq!(parts.timestamp.nanosecond(), 500_000_000);
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(matches!(parse_filename("README.md"), Err(FilenameError::Malformed(_))));
        assert!(matches!(
            parse_filename("compA 2023-13-40 14:42:02.1.bz2"),
            Err(FilenameError::Malformed(_))
        ));
        assert!(matches!(
            parse_filename("compA 2023-12-28 25:00:00.bz2"),
            Err(FilenameError::Malformed(_))
        ));
        assert!(matches!(
            parse_filename("compA 2023-12-28 14:42:02..bz2"),
            Err(FilenameError::Malformed(_))
        ));
    }
}
