//! Error types for cfp-papers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cfp_common::JsonResult;
use thiserror::Error;
use tracing::error;

use crate::archive::ArchiveError;

/// API error type
///
/// Validation problems are not errors: they travel in the result's
/// `message_list`. These variants cover requests the API cannot process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Body could not be extracted (oversized, malformed form data)
    #[error("{1}")]
    Rejected(StatusCode, String),

    /// Unreadable ZIP upload (400)
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Storage failure (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// cfp-common error (500)
    #[error(transparent)]
    Common(#[from] cfp_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Archive(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(status, _) => *status,
            ApiError::Database(_) | ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error result in the API's JSON shape
    pub fn to_json_result(&self) -> JsonResult {
        JsonResult::make_error(self.status(), self.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            error!("Paper API failure: {}", self);
        }
        self.to_json_result().into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
