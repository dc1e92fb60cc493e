use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ApiMessage;

/// RepoError
///
/// The two failure kinds a caller of the repository can observe.
/// Structural problems in stored data are never reported here: normalization
/// absorbs them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    /// Caller-correctable validation failure. No mutation happened.
    #[error("{0}")]
    InvalidInput(String),

    /// The persistence substrate failed (disk, network, SQL). Prior state is retained.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl RepoError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        RepoError::StorageFailure(err.to_string())
    }

    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            RepoError::InvalidInput(msg) => msg.clone(),
            RepoError::StorageFailure(_) => "Lỗi khi lưu dữ liệu".to_string(),
        }
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::StorageFailure(format!("database: {err}"))
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RepoError::StorageFailure("remote store timed out".to_string())
        } else {
            RepoError::StorageFailure(format!("remote store: {err}"))
        }
    }
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::StorageFailure(format!("io: {err}"))
    }
}

/// JSON API mapping: validation failures are 400, storage failures are 500.
/// Storage details are logged, never returned to the client.
impl IntoResponse for RepoError {
    fn into_response(self) -> Response {
        let status = match &self {
            RepoError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RepoError::StorageFailure(detail) => {
                tracing::error!("storage failure: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ApiMessage::failure(self.user_message()))).into_response()
    }
}
