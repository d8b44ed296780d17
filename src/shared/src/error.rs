//! Validation errors raised while turning user or wire input into descriptors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SharedError>;

/// Errors produced by descriptor validation and inline image handling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SharedError {
    #[error("{0}")]
    MissingCredentials(String),

    #[error("{0}")]
    MissingImage(String),

    #[error("{message}")]
    Validation { field: String, message: String },
}

impl SharedError {
    pub fn missing_credentials(message: impl Into<String>) -> Self {
        Self::MissingCredentials(message.into())
    }

    pub fn missing_image(message: impl Into<String>) -> Self {
        Self::MissingImage(message.into())
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Machine-readable kind, as carried in relay error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            SharedError::MissingCredentials(_) => crate::types::api::KIND_MISSING_CREDENTIALS,
            SharedError::MissingImage(_) => crate::types::api::KIND_MISSING_IMAGE,
            SharedError::Validation { .. } => crate::types::api::KIND_VALIDATION,
        }
    }
}
