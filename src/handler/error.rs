use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    NotFound,
    BadRequest(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, json!({"error": "not found"})),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({"error": "bad request", "message": msg})),
            AppError::InternalServerError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "internal server error", "message": msg}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        tracing::error!("no database connection: {}", e);
        AppError::InternalServerError("database unavailable".to_string())
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(e: diesel::result::Error) -> Self {
        tracing::error!("database error: {}", e);
        AppError::InternalServerError("database error".to_string())
    }
}
