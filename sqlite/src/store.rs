//! The long-lived store handle.
//!
//! A [`Store`] owns one SQLite connection and the name of the one table it
//! manages. It is constructed once at process start, passed down to whatever
//! serves requests, and torn down with [`Store::close`].
//!
//! The connection sits behind a mutex that is held for the whole
//! synchronize-then-insert sequence of a batch, so threads sharing a store
//! never interleave schema changes and inserts. Writers on other
//! connections are serialized by SQLite's write lock (see
//! [`synchronize`](crate::synchronize)).
//!
//! # Example
//!
//! ```
//! use tabsync_core::RawTable;
//! use tabsync_sqlite::{BatchOutcome, Store};
//!
//! let store = Store::open_in_memory("financial_records").unwrap();
//!
//! let table = RawTable::from_text([
//!     vec![Some("Date"), Some("Amount (in Rs.)")],
//!     vec![Some("2024-01-01"), Some("100")],
//! ]);
//! let outcome = store.process_batch(&[table]).unwrap();
//! assert!(matches!(outcome, BatchOutcome::Success { rows_inserted: 1, .. }));
//!
//! assert!(matches!(store.process_batch(&[]).unwrap(), BatchOutcome::Skipped { .. }));
//!
//! let rows = store.list_all_records().unwrap();
//! assert_eq!(rows[0].value("amount_in_rs"), Some("100"));
//! ```

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use tabsync_core::{Batch, IDENTITY_COLUMN, RawTable, TableSource, normalize_tables};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::inspect::{TableColumns, count_rows, current_columns};
use crate::insert::insert_batch;
use crate::migration::{SyncReport, synchronize};
use crate::query::{StoredRecord, fetch_all};
use crate::schema::{case_conflict, validate_table_name};

/// Reason reported with a skipped batch.
pub const SKIPPED_REASON: &str = "No tabular data found";

/// Result of processing one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// The batch held no records; the store was not touched.
    Skipped { reason: String },
    /// The schema was synchronized and every record was inserted.
    Success {
        rows_inserted: usize,
        columns_detected: Vec<String>,
        #[serde(rename = "schema_changes")]
        schema: SyncReport,
    },
}

/// Snapshot of the managed table, as reported by [`Store::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub table: String,
    pub table_exists: bool,
    /// Data columns, excluding the identity column.
    pub column_count: usize,
    pub row_count: usize,
}

/// Process-wide handle to the dynamic table.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
    table: String,
}

impl Store {
    /// Opens (or creates) the database file at `path`.
    ///
    /// `busy_timeout` bounds how long a writer waits for another connection
    /// holding the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTableName`] for a bad table name, or
    /// [`StoreError::DatabaseError`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, table: impl Into<String>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        info!(path = %path.as_ref().display(), "opened store");
        Self::from_connection(conn, table)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(table: impl Into<String>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, table)
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Normalizes raw tables and stores the resulting batch.
    ///
    /// An input with no usable records yields [`BatchOutcome::Skipped`]
    /// and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaError`] when synchronization fails (no
    /// schema change is kept) and [`StoreError::InsertionError`] when the
    /// write fails (columns added for the batch are kept, no row is).
    pub fn process_batch(&self, tables: &[RawTable]) -> Result<BatchOutcome> {
        self.process_records(&normalize_tables(tables))
    }

    /// Pulls tables from an upstream source and stores them.
    ///
    /// # Errors
    ///
    /// An upstream failure is returned as [`StoreError::UpstreamError`]
    /// before anything touches the store.
    pub fn ingest<S: TableSource + ?Sized>(&self, source: &S) -> Result<BatchOutcome> {
        let tables = source.tables()?;
        self.process_batch(&tables)
    }

    /// Synchronizes the schema for `batch` and inserts it.
    ///
    /// # Errors
    ///
    /// Batches carrying the identity column, or two keys that differ only in
    /// ASCII case, are rejected before the store is touched.
    pub fn process_records(&self, batch: &Batch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            debug!(table = %self.table, "empty batch; skipping");
            return Ok(BatchOutcome::Skipped {
                reason: SKIPPED_REASON.to_string(),
            });
        }

        let keys = batch.keys();
        if let Some(key) = keys.iter().find(|k| k.eq_ignore_ascii_case(IDENTITY_COLUMN)) {
            return Err(StoreError::ReservedColumn {
                table: self.table.clone(),
                column: key.clone(),
            });
        }

        if let Some((first, second)) = case_conflict(&keys) {
            return Err(StoreError::ConflictingKeys {
                table: self.table.clone(),
                first: first.clone(),
                second: second.clone(),
            });
        }

        let conn = self.lock()?;
        let schema = synchronize(&conn, &self.table, &keys)?;
        let summary = insert_batch(&conn, &self.table, batch)?;
        drop(conn);

        info!(
            table = %self.table,
            rows = summary.rows_inserted,
            columns_added = schema.added.len(),
            "stored batch"
        );
        Ok(BatchOutcome::Success {
            rows_inserted: summary.rows_inserted,
            columns_detected: summary.columns_detected,
            schema,
        })
    }

    /// Returns every persisted record; empty if nothing was ever stored.
    pub fn list_all_records(&self) -> Result<Vec<StoredRecord>> {
        let conn = self.lock()?;
        fetch_all(&conn, &self.table)
    }

    /// Returns the current column set of the managed table.
    pub fn columns(&self) -> Result<TableColumns> {
        let conn = self.lock()?;
        current_columns(&conn, &self.table)
    }

    /// Reports whether the table exists and how large it is.
    pub fn status(&self) -> Result<StoreStatus> {
        let conn = self.lock()?;
        let columns = current_columns(&conn, &self.table)?;
        let column_count = columns
            .names()
            .iter()
            .filter(|c| !c.eq_ignore_ascii_case(IDENTITY_COLUMN))
            .count();
        Ok(StoreStatus {
            table: self.table.clone(),
            table_exists: columns.exists(),
            column_count,
            row_count: count_rows(&conn, &self.table)?,
        })
    }

    /// Closes the connection, reporting any error SQLite raises on close.
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, err)| StoreError::DatabaseError(err))?;
        info!(table = %self.table, "closed store");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}
