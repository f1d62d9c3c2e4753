use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

/// Upstream holdings page could not be turned into rows.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("table body with class \"{0}\" not found")]
    TableNotFound(String),

    #[error("holdings table contained no rows")]
    NoRows,

    #[error("invalid selector: {0}")]
    Selector(String),
}

/// Local snapshot store could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no persisted snapshot")]
    Empty,

    #[error("persisted snapshot is corrupt: {0}")]
    Corrupt(String),
}

/// No snapshot could be produced by any path: fresh, cached or persisted.
#[derive(Debug, Clone, Error)]
#[error("no holdings data available: {reason}")]
pub struct NoDataAvailable {
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    NoData(#[from] NoDataAvailable),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match &self {
            AppError::NoData(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch holdings data",
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        let message = match self {
            AppError::NoData(e) => e.reason,
            other => other.to_string(),
        };
        let body = serde_json::json!({ "error": error, "message": message });
        (status, Json(body)).into_response()
    }
}
