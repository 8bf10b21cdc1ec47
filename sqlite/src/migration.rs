//! Additive schema synchronization.
//!
//! [`synchronize`] makes a table's column set a superset of a batch's keys:
//! it creates the table on first use and afterwards only ever adds nullable
//! `TEXT` columns. Columns are never dropped, renamed, or retyped.
//!
//! # Atomicity and concurrency
//!
//! All DDL for one call runs inside a single `BEGIN IMMEDIATE` transaction.
//! SQLite hands out the write lock up front, so concurrent writers on other
//! connections queue behind it (bounded by the connection's busy timeout)
//! and the schema is re-inspected under the lock. SQLite DDL is
//! transactional: if any `ADD COLUMN` fails, every addition made for the
//! call is rolled back when the transaction drops.
//!
//! Should another writer still add the same column first, SQLite reports
//! `duplicate column name`; that is treated as success.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use tabsync_sqlite::{current_columns, synchronize};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let keys = vec!["date".to_string(), "amount".to_string()];
//!
//! let report = synchronize(&conn, "records", &keys).unwrap();
//! assert!(report.created);
//!
//! let report = synchronize(&conn, "records", &keys).unwrap();
//! assert!(report.is_noop());
//! assert_eq!(current_columns(&conn, "records").unwrap().names(), ["id", "date", "amount"]);
//! ```

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tabsync_core::IDENTITY_COLUMN;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::inspect::{TableColumns, current_columns};
use crate::schema::{
    distinct_columns, generate_add_column_sql, generate_create_table_sql, validate_table_name,
};

/// What a call to [`synchronize`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// The table did not exist and was created.
    pub created: bool,
    /// Columns added by this call (all of them when `created`).
    pub added: Vec<String>,
    /// Columns another writer added between inspection and `ADD COLUMN`.
    pub raced: Vec<String>,
}

impl SyncReport {
    /// Returns `true` when the schema already covered every key.
    pub fn is_noop(&self) -> bool {
        !self.created && self.added.is_empty() && self.raced.is_empty()
    }
}

/// Synchronizes `table` so that every key in `incoming` is a column.
///
/// Keys that already exist are left alone (matching is ASCII
/// case-insensitive, like SQLite's). Keys that differ only in case count
/// once, under their first spelling. When the table is absent it is created
/// with the identity column followed by `incoming` in order.
///
/// # Errors
///
/// Returns [`StoreError::SchemaError`] if the transaction cannot start, if
/// any DDL statement fails, or if the commit fails. Nothing is committed in
/// that case.
pub fn synchronize(conn: &Connection, table: &str, incoming: &[String]) -> Result<SyncReport> {
    validate_table_name(table)?;
    let incoming = distinct_columns(incoming);
    let schema_err = |column: Option<&str>| {
        let table = table.to_string();
        let column = column.map(str::to_string);
        move |source| StoreError::SchemaError {
            table,
            column,
            source,
        }
    };

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(schema_err(None))?;
    let mut report = SyncReport::default();

    match current_columns(&tx, table)? {
        TableColumns::TableAbsent => {
            let sql = generate_create_table_sql(table, &incoming);
            tx.execute_batch(&sql).map_err(schema_err(None))?;
            info!(table, columns = incoming.len(), "created table");
            report.created = true;
            report.added = incoming
                .iter()
                .filter(|k| k.as_str() != IDENTITY_COLUMN)
                .cloned()
                .collect();
        }
        existing @ TableColumns::Present(_) => {
            for column in existing.missing(&incoming) {
                match tx.execute(&generate_add_column_sql(table, column), []) {
                    Ok(_) => {
                        info!(table, column = %column, "adding column");
                        report.added.push(column.clone());
                    }
                    Err(err) if is_duplicate_column(&err) => {
                        warn!(table, column = %column, "column appeared concurrently; continuing");
                        report.raced.push(column.clone());
                    }
                    Err(err) => return Err(schema_err(Some(column.as_str()))(err)),
                }
            }
        }
    }

    tx.commit().map_err(schema_err(None))?;
    if report.is_noop() {
        debug!(table, keys = incoming.len(), "schema already up to date");
    }
    Ok(report)
}

/// Returns `true` if `err` is SQLite rejecting an `ADD COLUMN` for a column
/// that already exists.
pub(crate) fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("duplicate column name")
    )
}
