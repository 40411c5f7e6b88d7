//! Error taxonomy for ragbox.
//!
//! Soft outcomes (no extractable text, zero chunks, missing parser) are not
//! errors: they travel as diagnostics inside [`IngestionReport`](crate::models::IngestionReport).
//! The variants below are the hard failures, split so that callers can tell a
//! bad request from a broken deployment:
//!
//! | Variant | Class | Example |
//! |---------|-------|---------|
//! | [`RagError::Input`] | input | empty upload, missing filename |
//! | [`RagError::Io`] | input | uploaded file unreadable |
//! | [`RagError::Configuration`] | configuration | no embedding provider, model mismatch |
//! | [`RagError::Embedding`] | internal | provider call failed mid-request |
//! | [`RagError::Store`] | internal | SQLite write failed |
//! | [`RagError::Internal`] | internal | blocking task panicked |

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// The request itself is unusable.
    #[error("invalid input: {0}")]
    Input(String),

    /// A file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The deployment is misconfigured or a backend could not be initialized.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An initialized embedding provider failed to embed.
    #[error("embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },

    /// The index backend failed.
    #[error("vector store error ({backend}): {message}")]
    Store { backend: String, message: String },

    /// Anything else unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RagError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn store(backend: &str, err: impl std::fmt::Display) -> Self {
        RagError::Store {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }

    /// True for failures caused by the request (bad or unreadable upload).
    pub fn is_input(&self) -> bool {
        matches!(self, RagError::Input(_) | RagError::Io { .. })
    }

    /// True for failures that point at the deployment rather than the document.
    pub fn is_configuration(&self) -> bool {
        matches!(self, RagError::Configuration(_))
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::store("sqlite", err)
    }
}

impl From<tokio::task::JoinError> for RagError {
    fn from(err: tokio::task::JoinError) -> Self {
        RagError::Internal(format!("blocking task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
