use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

const DEV_ORIGINS: [&str; 2] = ["http://localhost:8050", "http://127.0.0.1:8050"];

/// Origins from a comma-separated `ALLOWED_ORIGINS` value; blanks and
/// unparsable entries are ignored.
pub fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect()
}

pub fn cors_layer() -> CorsLayer {
    let mut origins = parse_origins(&std::env::var("ALLOWED_ORIGINS").unwrap_or_default());
    if origins.is_empty() {
        origins = DEV_ORIGINS.iter().map(|o| HeaderValue::from_static(o)).collect();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
