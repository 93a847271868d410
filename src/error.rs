use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::response::ApiResponse;
use crate::users::repo::RepoError;

pub const EMAIL_EXISTS: &str = "Email already exists";
pub const USER_NOT_FOUND: &str = "User not found";
const INTERNAL: &str = "Internal Server Error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Validation { message: String, errors: Option<Value> },

    #[error("{0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found() -> Self {
        Self::NotFound(USER_NOT_FOUND.into())
    }

    pub fn email_exists() -> Self {
        Self::Conflict(EMAIL_EXISTS.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) | ApiError::Database(_) | ApiError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client. Storage and unexpected failures are
    /// reported generically; their detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) | ApiError::Other(_) => INTERNAL.to_string(),
            other => other.to_string(),
        }
    }

    fn errors(&self) -> Option<Value> {
        match self {
            ApiError::Validation { errors, .. } => errors.clone(),
            _ => None,
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::UniqueViolation(_) => ApiError::email_exists(),
            RepoError::Database(e) => ApiError::Database(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation {
            message: "Invalid request body".into(),
            errors: Some(json!({ "body": rejection.body_text() })),
        }
    }
}

fn log_failure(status: StatusCode, message: &dyn std::fmt::Display) {
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %message, "request failed");
    } else {
        warn!(status = status.as_u16(), error = %message, "request failed");
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        log_failure(status, &self);
        ApiResponse::error(self.public_message(), status, self.errors()).into_response()
    }
}

/// Wraps error responses produced outside the handlers (method mismatch,
/// timeouts) in the envelope. Responses that already carry a body type are
/// left alone.
pub async fn envelope_bare_errors(res: Response) -> Response {
    let status = res.status();
    if !(status.is_client_error() || status.is_server_error())
        || res.headers().contains_key(header::CONTENT_TYPE)
    {
        return res;
    }
    let message = status.canonical_reason().unwrap_or("Request failed");
    log_failure(status, &message);
    ApiResponse::error(message, status, None).into_response()
}
