use thiserror::Error;

/// Trailing annotations Boursorama appends to the last price.
const PRICE_MARKERS: [&str; 2] = ["(c)", "(s)"];

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot parse price '{raw}'")]
pub struct PriceParseError {
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot parse volume '{raw}'")]
pub struct VolumeParseError {
    pub raw: String,
}

fn strip_whitespace(raw: &str) -> String {
    // char::is_whitespace also covers the no-break spaces used as thousands separators
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Clean a raw last-price field into a number.
///
/// `(c)` / `(s)` markers and every kind of whitespace are removed, a comma is
/// read as the decimal separator. Already clean input comes back unchanged.
pub fn normalize_price<S: AsRef<str>>(raw: S) -> Result<f64, PriceParseError> {
    let raw = raw.as_ref();
    let mut cleaned = strip_whitespace(raw);
    for marker in PRICE_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    let cleaned = cleaned.replace(',', ".");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PriceParseError { raw: raw.to_string() })
}

/// Clean a raw volume field. Empty means no trade.
pub fn normalize_volume<S: AsRef<str>>(raw: S) -> Result<i64, VolumeParseError> {
    let raw = raw.as_ref();
    let cleaned = strip_whitespace(raw);
    if cleaned.is_empty() {
        return Ok(0);
    }
    if let Ok(v) = cleaned.parse::<i64>() {
        return Ok(v);
    }
    match cleaned.replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(VolumeParseError { raw: raw.to_string() }),
    }
}
