use axum::{http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A threshold outside its sane range. Raised before any ticker is evaluated.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Defects in a single ticker's daily series. Local to that ticker: the scan
/// logs and skips it, never aborting the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("dates not ascending at {0}")]
    UnsortedDates(NaiveDate),

    #[error("duplicate date {0}")]
    DuplicateDate(NaiveDate),

    #[error("negative volume on {0}")]
    NegativeVolume(NaiveDate),

    #[error("non-finite or negative close on {0}")]
    InvalidClose(NaiveDate),
}
