use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

use crate::models::result_record::ResultStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("candidate already has an attempt in progress for this test")]
    AttemptInProgress,

    #[error("attempt limit reached: at most {0} attempts allowed for this test")]
    AttemptLimitExceeded(u32),

    #[error("attempt number already taken for this candidate/test pair")]
    AttemptNumberTaken,

    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("operation not valid for attempt status '{0}'")]
    InvalidState(ResultStatus),

    #[error("attempt was already finalized")]
    ConflictAlreadyFinalized,

    #[error("analysis service unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("too many requests, slow down")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code carried in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::AttemptInProgress => "attempt_in_progress",
            Error::AttemptLimitExceeded(_) => "attempt_limit_exceeded",
            Error::AttemptNumberTaken => "attempt_number_taken",
            Error::SessionNotFound(_) => "session_not_found",
            Error::InvalidState(_) => "invalid_state",
            Error::ConflictAlreadyFinalized => "conflict_already_finalized",
            Error::AnalysisUnavailable(_) => "analysis_unavailable",
            Error::RateLimited => "rate_limited",
            Error::BadRequest(_) => "bad_request",
            Error::NotFound(_) => "not_found",
            Error::Database(_) => "database_error",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "json_error",
            Error::Reqwest(_) => "upstream_error",
            Error::Internal(_) => "internal_error",
            Error::Io(_) => "io_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::AttemptInProgress => StatusCode::CONFLICT,
            Error::AttemptLimitExceeded(_) => StatusCode::FORBIDDEN,
            Error::AttemptNumberTaken => StatusCode::CONFLICT,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::ConflictAlreadyFinalized => StatusCode::CONFLICT,
            Error::AnalysisUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Reqwest(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Database(_) | Error::Internal(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
