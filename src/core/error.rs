/// Recadmin Error Module
///
/// This module defines the error taxonomy shared by every record operation.
/// Most variants describe a rejected request (unknown table, bad value,
/// missing key) and are recovered by the shell as a status line; only
/// driver, I/O and configuration failures are treated as fatal.
use crate::value::ColumnKind;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Error type for every fallible recadmin operation.
#[derive(Error, Debug)]
pub enum RecadminError {
    /// Unexpected driver or connectivity failure from SQLite
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The named table does not exist in the live schema
    #[error("table not found: {0}")]
    SchemaNotFound(String),

    /// The named column is not part of the target table
    #[error("column not found: {column} (table {table})")]
    UnknownColumn { table: String, column: String },

    /// A raw token could not be coerced to the column's kind
    #[error("invalid value{}: {raw:?} is not a valid {kind}", .column.as_deref().map(|c| format!(" for {c}")).unwrap_or_default())]
    InvalidValue {
        column: Option<String>,
        kind: ColumnKind,
        raw: String,
    },

    /// Update was requested on a table that declares no primary key
    #[error("no primary key found: {0}")]
    NoPrimaryKey(String),

    /// The primary key selector does not address exactly the key columns
    #[error("primary key selector for {table} must name exactly: {}", .expected.join(", "))]
    IncompleteKey { table: String, expected: Vec<String> },

    /// No row matches the primary key selector
    #[error("record not found")]
    RecordNotFound,

    /// Constraint failure reported by the driver, message kept verbatim
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecadminError {
    /// Whether the error is a handled rejection rather than a fault.
    ///
    /// Recoverable errors leave the database untouched and are reported to
    /// the user as a status line; the rest terminate the invocation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RecadminError::Database(_)
                | RecadminError::Config(_)
                | RecadminError::Io(_)
                | RecadminError::Json(_)
        )
    }

    /// Maps a driver error raised while executing a statement, splitting
    /// constraint failures out of the generic database bucket.
    pub(crate) fn from_execution(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, ref message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                RecadminError::ConstraintViolation(detail)
            }
            other => RecadminError::Database(other),
        }
    }
}

impl From<toml::de::Error> for RecadminError {
    fn from(err: toml::de::Error) -> Self {
        RecadminError::Config(err.to_string())
    }
}

/// Type alias for Result to use RecadminError as the error type.
pub type Result<T> = std::result::Result<T, RecadminError>;
