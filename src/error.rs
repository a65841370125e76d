//! Error types for manifest generation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout_ms} ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("Query endpoint returned {status}: {message}")]
    QueryFailed { status: u16, message: String },

    #[error("Failed to decode query result: {0}")]
    Decode(String),

    #[error("Shape mismatch at '{path}': {reason}")]
    ShapeMismatch { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ManifestError {
    pub(crate) fn shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ManifestError::ShapeMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status a request handler should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ManifestError::InvalidIdentifier { .. } => 400,
            ManifestError::ShapeMismatch { .. } => 404,
            ManifestError::Transport { .. }
            | ManifestError::QueryFailed { .. }
            | ManifestError::Decode(_) => 502,
            ManifestError::Timeout { .. } => 504,
            ManifestError::Config(_) | ManifestError::Io(_) | ManifestError::Json(_) => 500,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ManifestError::Transport { .. } | ManifestError::Timeout { .. }
        )
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ManifestError::InvalidIdentifier { .. } => "invalid_identifier",
            ManifestError::Transport { .. } => "transport_failure",
            ManifestError::Timeout { .. } => "timeout",
            ManifestError::QueryFailed { .. } => "query_failure",
            ManifestError::Decode(_) => "decode_failure",
            ManifestError::ShapeMismatch { .. } => "shape_mismatch",
            ManifestError::Config(_) => "config",
            ManifestError::Io(_) => "io",
            ManifestError::Json(_) => "json",
        }
    }
}
