//! Error types for the request orchestrator

use serde_json::Value;
use thiserror::Error;

use ml_tester_shared::SharedError;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Everything that can stop a send or a session operation
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("{0}")]
    Configuration(String),

    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    MissingImage(String),

    /// The remote service answered with a failure the relay passed back
    #[error("{message}")]
    Remote {
        status: u16,
        message: String,
        payload: Value,
    },

    /// The request never produced an answer
    #[error("{message}")]
    Transport { message: String, likely_cors: bool },

    #[error("{0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn transport(message: impl Into<String>, likely_cors: bool) -> Self {
        Self::Transport {
            message: message.into(),
            likely_cors,
        }
    }

    /// Status carried by the envelope built from this error.
    ///
    /// Only remote failures have a real HTTP status; everything else is 0.
    pub fn status_code(&self) -> u16 {
        match self {
            OrchestratorError::Remote { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn is_likely_cors(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Transport {
                likely_cors: true,
                ..
            }
        )
    }

    /// Whether the error was raised before anything was dispatched
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Configuration(_)
                | OrchestratorError::Validation { .. }
                | OrchestratorError::MissingImage(_)
        )
    }
}

impl From<SharedError> for OrchestratorError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::MissingCredentials(message) => OrchestratorError::Configuration(message),
            SharedError::MissingImage(message) => OrchestratorError::MissingImage(message),
            SharedError::Validation { field, message } => {
                OrchestratorError::Validation { field, message }
            }
        }
    }
}
