//! Error types for store operations.
//!
//! Provides a unified error type covering schema changes, batch writes,
//! upstream extraction failures, and the internal invariants of the
//! synchronize-then-insert pipeline.

use tabsync_core::UpstreamError;
use thiserror::Error;

/// Errors that can occur while synchronizing, writing, or reading a table.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure outside of a schema change or batch write
    /// (opening, inspecting, reading).
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A `CREATE TABLE` or `ALTER TABLE ... ADD COLUMN` failed. Nothing from
    /// the failing synchronization is committed.
    #[error("schema change failed for table '{table}'{}: {source}", column_context(.column))]
    SchemaError {
        table: String,
        column: Option<String>,
        #[source]
        source: rusqlite::Error,
    },

    /// Writing the batch failed after the schema was synchronized. No row of
    /// the batch is committed; columns added for it are kept.
    #[error("insert into table '{table}' failed{}: {source}", record_context(.record))]
    InsertionError {
        table: String,
        record: Option<usize>,
        #[source]
        source: rusqlite::Error,
    },

    /// The document extractor failed; the batch was not attempted.
    #[error(transparent)]
    UpstreamError(#[from] UpstreamError),

    /// A record carries a key the synchronized table does not have.
    #[error("internal invariant violated: column '{column}' is missing from table '{table}' after synchronization")]
    UnknownColumn { table: String, column: String },

    /// A record carries a value for the generated identity column.
    #[error("column '{column}' of table '{table}' is generated and cannot be written")]
    ReservedColumn { table: String, column: String },

    /// Two keys of one batch differ only in ASCII case and would share a column.
    #[error("keys '{first}' and '{second}' map to the same column of table '{table}'")]
    ConflictingKeys {
        table: String,
        first: String,
        second: String,
    },

    /// The table to write to does not exist.
    #[error("internal invariant violated: table '{0}' does not exist after synchronization")]
    MissingTable(String),

    /// Table name contains invalid characters.
    #[error("invalid table name '{0}': must contain only ASCII alphanumeric characters and underscores")]
    InvalidTableName(String),

    /// A thread panicked while holding the store connection.
    #[error("store connection lock poisoned")]
    Poisoned,
}

fn column_context(column: &Option<String>) -> String {
    column
        .as_ref()
        .map(|c| format!(" (column '{c}')"))
        .unwrap_or_default()
}

fn record_context(record: &Option<usize>) -> String {
    record
        .map(|index| format!(" at record {index}"))
        .unwrap_or_default()
}

/// Coarse classification of a [`StoreError`] for callers that report
/// outcomes without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Insertion,
    Upstream,
    Internal,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::SchemaError { .. } => ErrorKind::Schema,
            StoreError::InsertionError { .. } => ErrorKind::Insertion,
            StoreError::UpstreamError(_) => ErrorKind::Upstream,
            StoreError::DatabaseError(_)
            | StoreError::UnknownColumn { .. }
            | StoreError::ReservedColumn { .. }
            | StoreError::ConflictingKeys { .. }
            | StoreError::MissingTable(_)
            | StoreError::InvalidTableName(_)
            | StoreError::Poisoned => ErrorKind::Internal,
        }
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_table_and_column() {
        let err = StoreError::SchemaError {
            table: "records".to_string(),
            column: Some("vendor".to_string()),
            source: rusqlite::Error::InvalidQuery,
        };
        let msg = err.to_string();
        assert!(msg.contains("'records'"));
        assert!(msg.contains("column 'vendor'"));
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_schema_error_without_column() {
        let err = StoreError::SchemaError {
            table: "records".to_string(),
            column: None,
            source: rusqlite::Error::InvalidQuery,
        };
        assert!(!err.to_string().contains("column"));
    }

    #[test]
    fn test_insertion_error_names_record() {
        let err = StoreError::InsertionError {
            table: "records".to_string(),
            record: Some(3),
            source: rusqlite::Error::InvalidQuery,
        };
        assert!(err.to_string().contains("at record 3"));
        assert_eq!(err.kind(), ErrorKind::Insertion);
    }

    #[test]
    fn test_upstream_error_is_verbatim() {
        let upstream = UpstreamError::InvalidShape("no tables".to_string());
        let expected = upstream.to_string();
        let err = StoreError::from(upstream);
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }
}
