//! Error types for filedepot.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Common error type for filedepot.
#[derive(Error, Debug)]
pub enum DepotError {
    /// Database error.
    ///
    /// This is a generic metadata-store error that wraps errors from the
    /// database backend. Errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// File not found, either in the metadata store or on disk.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Folder not found.
    #[error("folder not found: {0}")]
    FolderNotFound(String),

    /// Failure writing uploaded bytes to disk.
    #[error("upload error: {0}")]
    Upload(String),

    /// Preview generation failed after all fallback attempts.
    #[error("thumbnail error: {0}")]
    Thumbnail(String),

    /// Hierarchy integrity violation (e.g. a parent cycle).
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Boundary-facing error classification.
///
/// The HTTP layer resolves every error into a `{type, message, timestamp}`
/// payload; the core is only responsible for choosing the correct type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    FileNotFound,
    FolderNotFound,
    Upload,
    Thumbnail,
    Database,
    Configuration,
}

impl ErrorKind {
    /// The wire label for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::FileNotFound => "FILE_NOT_FOUND",
            ErrorKind::FolderNotFound => "FOLDER_NOT_FOUND",
            ErrorKind::Upload => "UPLOAD_ERROR",
            ErrorKind::Thumbnail => "THUMBNAIL_ERROR",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
        }
    }
}

/// Structured error payload handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct ErrorPayload {
    /// Wire label, e.g. `VALIDATION_ERROR`.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// When the error was produced.
    pub timestamp: DateTime<Utc>,
}

impl DepotError {
    /// Classify this error for the boundary payload.
    ///
    /// Permission denials are user-facing validation outcomes, not bugs, so
    /// they report as `VALIDATION_ERROR`. Integrity violations indicate
    /// corrupt store state and report as `DATABASE_ERROR`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DepotError::Validation(_) | DepotError::Permission(_) => ErrorKind::Validation,
            DepotError::FileNotFound(_) => ErrorKind::FileNotFound,
            DepotError::FolderNotFound(_) => ErrorKind::FolderNotFound,
            DepotError::Upload(_) | DepotError::Io(_) => ErrorKind::Upload,
            DepotError::Thumbnail(_) => ErrorKind::Thumbnail,
            DepotError::Database(_) | DepotError::Integrity(_) => ErrorKind::Database,
            DepotError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Build the structured payload for the boundary.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().as_str(),
            message: self.to_string(),
            timestamp: Utc::now(),
        }
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for DepotError {
    fn from(e: sqlx::Error) -> Self {
        DepotError::Database(e.to_string())
    }
}

/// Result type alias for filedepot operations.
pub type Result<T> = std::result::Result<T, DepotError>;
