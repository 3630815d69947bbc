//! Error type shared by the store, auth and HTTP handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Error type for every fallible service operation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A record with the given id does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Collection or record kind.
        kind: &'static str,
        /// Requested id.
        id: String,
    },

    /// The request was malformed or failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// No valid session accompanied the request.
    #[error("authentication required")]
    Unauthorized,

    /// Credentials did not match.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The caller is authenticated but may not do this.
    #[error("{0}")]
    Forbidden(String),

    /// The change would break a relation or a uniqueness rule.
    #[error("{0}")]
    Conflict(String),

    /// Reading or writing the data directory failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A collection file could not be (de)serialized.
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),

    /// A snapshot could not be encoded or decoded.
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] bincode::Error),

    /// The workbook writer failed.
    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    /// A multipart body could not be read, or went over the upload limit.
    #[error("invalid upload: {0}")]
    Upload(#[from] axum::extract::multipart::MultipartError),

    /// Password hashing failed.
    #[error("password hashing failed")]
    PasswordHash,

    /// Start-up configuration was invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound { kind, id: id.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Snapshot(_) => StatusCode::BAD_REQUEST,
            AppError::Upload(e) => e.status(),
            AppError::Storage(_)
            | AppError::Json(_)
            | AppError::Workbook(_)
            | AppError::PasswordHash
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body sent with every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        }
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
