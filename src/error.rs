//! Custom error types for tweetstore.
//!
//! Provides structured error handling with enough context to tell a bad feed
//! record apart from a storage failure.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for tweetstore operations.
///
/// Input errors (`MissingField`, `InvalidField`, `InvalidDate`) are raised
/// before anything is written; storage errors may surface after one of the
/// two entity writes has already landed.
#[derive(Error, Debug)]
pub enum TweetStoreError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// A required key is absent from the raw status object.
    #[error("Missing required field '{field}' in status object")]
    MissingField { field: String },

    /// A key is present but holds a value of the wrong shape.
    #[error("Invalid value for '{field}': expected {expected}, found {found}")]
    InvalidField {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// A date string could not be parsed.
    #[error("Invalid date format '{value}' in {context}")]
    InvalidDate { value: String, context: String },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// A create lost a race against another writer on a unique key.
    #[error("{entity} with external id {key} already exists")]
    DuplicateKey { entity: &'static str, key: i64 },

    /// Database file not found.
    #[error("No database found at: {path}\nRun 'tweetstore ingest <feed>' first.")]
    DatabaseNotFound { path: PathBuf },

    /// Database schema version mismatch.
    #[error("Database schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: i32, found: i32 },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    /// Path-specific IO error with context.
    #[error("Failed to {operation} '{path}': {source}")]
    PathError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    /// Environment variable error.
    #[error("Invalid environment variable {var}: {reason}")]
    EnvVarError { var: String, reason: String },

    // =========================================================================
    // CLI Errors
    // =========================================================================
    /// Invalid command-line argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Data not found.
    #[error("{item_type} with ID '{id}' not found")]
    NotFound { item_type: &'static str, id: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for tweetstore operations.
pub type Result<T> = std::result::Result<T, TweetStoreError>;

impl TweetStoreError {
    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid field error, describing the JSON value that was found.
    pub fn invalid_field(
        field: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            expected,
            found: json_kind(found).to_string(),
        }
    }

    /// Create an invalid date error.
    pub fn invalid_date(value: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create a database not found error.
    pub fn database_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DatabaseNotFound { path: path.into() }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(item_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            item_type,
            id: id.into(),
        }
    }

    /// Create a path error with context.
    pub fn path_error(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::PathError {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Check if this error was caused by the input record rather than the store.
    #[must_use]
    pub const fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. } | Self::InvalidField { .. } | Self::InvalidDate { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DatabaseNotFound { .. } => {
                Some("Run 'tweetstore ingest <feed.jsonl>' to create the database.")
            }
            Self::SchemaMismatch { .. } => {
                Some("The database was written by a newer tweetstore; upgrade the binary.")
            }
            Self::DuplicateKey { .. } => {
                Some("Another writer created the same record concurrently; retry the record.")
            }
            Self::ConfigError { .. } => {
                Some("Check ~/.config/tweetstore/config.toml or run 'tweetstore config'.")
            }
            Self::EnvVarError { .. } => Some("Use true/false, yes/no, on/off or 1/0."),
            _ => None,
        }
    }
}

/// Human-readable name for the type of a JSON value.
const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TweetStoreError::with_context(context, e))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TweetStoreError::with_context(f(), e))
    }
}

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and an optional hint.
///
/// # Arguments
/// * `title` - Brief error title (e.g., "Invalid range")
/// * `explanation` - What went wrong and why
/// * `hint` - An actionable suggestion, if there is one
#[must_use]
pub fn format_error(title: &str, explanation: &str, hint: Option<&str>) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if let Some(hint) = hint {
        let _ = write!(output, "\n\n   {} {hint}", "Hint:".cyan());
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_field_display() {
        let err = TweetStoreError::missing_field("user.id");
        assert!(err.to_string().contains("user.id"));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_invalid_field_reports_found_kind() {
        let err = TweetStoreError::invalid_field("reply_count", "integer", &json!("three"));
        let msg = err.to_string();
        assert!(msg.contains("reply_count"));
        assert!(msg.contains("integer"));
        assert!(msg.contains("string"));
    }

    #[test]
    fn test_error_suggestions() {
        let err = TweetStoreError::database_not_found("/path/to/db");
        assert!(err.suggestion().is_some());
        assert!(!err.is_malformed_input());
    }

    #[test]
    fn test_duplicate_key_is_not_input_error() {
        let err = TweetStoreError::DuplicateKey {
            entity: "tweet",
            key: 100,
        };
        assert!(!err.is_malformed_input());
        assert!(err.to_string().contains("100"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_path_error_names_operation_and_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TweetStoreError::path_error("read", "/etc/tweetstore.toml", io_err);
        let msg = err.to_string();
        assert!(msg.contains("read"));
        assert!(msg.contains("/etc/tweetstore.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_rusqlite_error() {
        fn accepts_error(_: TweetStoreError) {}
        let sqlite_err = rusqlite::Error::InvalidQuery;
        accepts_error(sqlite_err.into());
    }

    #[test]
    fn format_error_with_hint() {
        let output = format_error("Test Error", "Something went wrong", Some("Try again"));
        assert!(output.contains("Test Error"));
        assert!(output.contains("Something went wrong"));
        assert!(output.contains("Try again"));

        let bare = format_error("Test Error", "", None);
        assert!(!bare.contains("Hint"));
    }
}
