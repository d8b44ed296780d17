//! Error handling for the relay
//!
//! Every failure is turned into a JSON body of the form
//! `{ "error": <message>, "kind": <kind>, "details"?: <remote payload> }`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ml_tester_shared::types::api::{
    RelayErrorBody, KIND_INTERNAL, KIND_MISSING_CREDENTIALS, KIND_MISSING_IMAGE, KIND_REMOTE,
    KIND_VALIDATION,
};
use ml_tester_shared::SharedError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Main error type for the relay
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    MissingCredentials { message: String },

    #[error("{message}")]
    MissingImage { message: String },

    #[error("{message}")]
    Validation { field: String, message: String },

    /// Remote service answered with a non-success status
    #[error("{message}")]
    Remote {
        status: StatusCode,
        message: String,
        details: serde_json::Value,
    },

    #[error("{message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new remote error
    pub fn remote(status: StatusCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Remote {
            status,
            message: message.into(),
            details,
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingCredentials { .. } => StatusCode::BAD_REQUEST,
            ApiError::MissingImage { .. } => StatusCode::BAD_REQUEST,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Remote { status, .. } => *status,
            ApiError::HttpClient(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error kind string for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::MissingCredentials { .. } => KIND_MISSING_CREDENTIALS,
            ApiError::MissingImage { .. } => KIND_MISSING_IMAGE,
            ApiError::Validation { .. } => KIND_VALIDATION,
            ApiError::Remote { .. } => KIND_REMOTE,
            ApiError::HttpClient(_) | ApiError::Json(_) | ApiError::Internal { .. } => {
                KIND_INTERNAL
            }
        }
    }

    /// Check if this error should be logged
    pub fn should_log(&self) -> bool {
        match self {
            // Caller mistakes and remote answers are expected traffic
            ApiError::MissingCredentials { .. }
            | ApiError::MissingImage { .. }
            | ApiError::Validation { .. }
            | ApiError::Remote { .. } => false,

            _ => true,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Remote { details, .. } => Some(details.clone()),
            _ => None,
        }
    }
}

impl From<SharedError> for ApiError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::MissingCredentials(message) => ApiError::MissingCredentials { message },
            SharedError::MissingImage(message) => ApiError::MissingImage { message },
            SharedError::Validation { field, message } => ApiError::Validation { field, message },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("body", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_type = self.error_type();

        if self.should_log() {
            error!(
                error = %self,
                status_code = %status_code,
                error_type = error_type,
                "Relay error occurred"
            );
        }

        let body = RelayErrorBody {
            error: self.to_string(),
            kind: Some(error_type.to_string()),
            details: self.details(),
        };

        (status_code, Json(body)).into_response()
    }
}
