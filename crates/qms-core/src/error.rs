//! Error types module
//!
//! All failures of the quota engine are unified under the `AppError` enum.
//! Callers decide how to present them by way of the `ErrorMetadata` trait;
//! nothing in the engine swallows an error.
//!
//! The `Database` variant carries a `sqlx::Error` when the `sqlx` feature is
//! enabled and a plain message otherwise.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like serialization conflicts
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error reports - defines how an error should be presented
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NO_EFFECTIVE_RATE")
    fn error_code(&self) -> &'static str;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Caller-facing message; infrastructure details are withheld
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("the {plan} subscription plan has no effective rate")]
    NoEffectiveRate { plan: String },

    #[error("invalid update operation: {0}")]
    InvalidUpdateOperation(String),

    #[error("unknown resource type: {name} ({unit})")]
    UnknownResourceType { name: String, unit: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

/// Static metadata for each variant: (error_code, suggested_action, log_level).
fn app_error_static_metadata(err: &AppError) -> (&'static str, Option<&'static str>, LogLevel) {
    match err {
        AppError::Database(_) => (
            "DATABASE_ERROR",
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::NotFound(_) => (
            "NOT_FOUND",
            Some("Verify the referenced ID exists"),
            LogLevel::Debug,
        ),
        AppError::NoEffectiveRate { .. } => (
            "NO_EFFECTIVE_RATE",
            Some("Add a plan rate effective now or earlier"),
            LogLevel::Warn,
        ),
        AppError::InvalidUpdateOperation(_) => (
            "INVALID_UPDATE_OPERATION",
            Some("Use ADD or SET"),
            LogLevel::Debug,
        ),
        AppError::UnknownResourceType { .. } => (
            "UNKNOWN_RESOURCE_TYPE",
            Some("Check the resource type name and unit"),
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => ("CONFLICT", Some("Retry the update"), LogLevel::Warn),
        AppError::InvalidInput(_) => (
            "INVALID_INPUT",
            Some("Check request parameters and try again"),
            LogLevel::Debug,
        ),
        AppError::Internal(_) => ("INTERNAL_ERROR", None, LogLevel::Error),
    }
}

impl AppError {
    /// True only for serialization conflicts on a usage row.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) => "Internal error".to_string(),
            AppError::NotFound(ref msg)
            | AppError::InvalidUpdateOperation(ref msg)
            | AppError::Conflict(ref msg)
            | AppError::InvalidInput(ref msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
