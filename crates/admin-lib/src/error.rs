// crates/admin-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected credentials or an unusable session
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Signed in, but the profile does not carry the owner role
    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The hosted backend answered with an error status
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, code: Option<String>, message: String },

    /// The hosted backend could not be reached
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Too many login attempts, try again in {retry_after_secs}s")]
    LoginThrottled { retry_after_secs: u64 },

    /// A catalog save failed at a named stage ("Create product failed", ...)
    #[error("{stage}: {source}")]
    SaveFailed {
        stage: &'static str,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::LoginThrottled { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Backend { .. } | AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::SaveFailed { source, .. } => source.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AUTH_001",
            AppError::Forbidden(_) => "AUTH_002",
            AppError::LoginThrottled { .. } => "AUTH_003",
            AppError::NotFound(_) => "NF_001",
            AppError::Backend { .. } => "BE_001",
            AppError::Transport(_) => "BE_002",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
            AppError::Validation(_) => "VAL_001",
            AppError::SaveFailed { .. } => "CAT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Auth(msg) | AppError::Forbidden(msg) => msg.clone(),
            AppError::LoginThrottled { .. } | AppError::Validation(_) => self.to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Backend { .. } | AppError::Transport(_) => {
                "The catalog backend is unavailable".to_string()
            },
            AppError::SaveFailed { stage, .. } => (*stage).to_string(),
            AppError::Internal(_) | AppError::Io(_) | AppError::Json(_) => {
                "An internal error occurred".to_string()
            },
        }
    }

    /// Backend error code such as `PGRST116`, when one was returned
    pub fn backend_code(&self) -> Option<&str> {
        match self {
            AppError::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn at_stage(self, stage: &'static str) -> Self {
        AppError::SaveFailed { stage, source: Box::new(self) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let mut body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });
        if let AppError::Validation(ValidationError::InvalidProduct(fields)) = &self {
            body["error"]["fields"] = serde_json::json!(fields);
        }

        (status, axum::Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
