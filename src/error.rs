// src/error.rs
//! Error taxonomy shared by the ingestion core, the store and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Transient fault while talking to the remote feed. Aborts the current tick only.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed answered with status {status}")]
    Status { status: u16 },

    #[error("feed body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected feed payload: {0}")]
    Payload(String),
}

/// A single raw item that cannot become a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing or blank field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable published timestamp `{0}`")]
    BadTimestamp(String),

    #[error("malformed item: {0}")]
    Shape(String),
}

/// Unexpected persistence fault. Duplicate keys are not reported through this type.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored row: {0}")]
    Corrupt(String),
}

/// Errors surfaced to HTTP callers. Internal detail never reaches the body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{public}")]
    Internal {
        public: &'static str,
        cause: anyhow::Error,
    },
}

/// Errors of the account routes. Bodies use a `message` key, like the rest of
/// the account API.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Server error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AuthError {
    fn from(cause: anyhow::Error) -> Self {
        AuthError::Internal(cause)
    }
}

impl From<StoreError> for AuthError {
    fn from(cause: StoreError) -> Self {
        AuthError::Internal(cause.into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Internal(cause) => {
                tracing::error!(error = ?cause, "account request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({ "message": self.to_string() }))).into_response()
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(public: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal {
            public,
            cause: cause.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal { cause, .. } => {
                tracing::error!(error = ?cause, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
