//! Batch insertion against a synchronized table.
//!
//! The table's columns are re-read right before the insert is built, since
//! synchronization may just have changed them. Every record is written with
//! the batch's full key list; keys a record lacks are bound as `NULL`.
//!
//! All rows of a batch go in one transaction: either the whole batch is
//! appended or none of it is.

use rusqlite::{Connection, Transaction, TransactionBehavior, params_from_iter};
use serde::Serialize;
use tabsync_core::{Batch, IDENTITY_COLUMN};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::inspect::{TableColumns, current_columns};
use crate::schema::{case_conflict, generate_insert_sql, validate_table_name};

/// Outcome of a successful [`insert_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertionSummary {
    /// Number of rows appended.
    pub rows_inserted: usize,
    /// Distinct keys seen in the batch, in first-seen order.
    pub columns_detected: Vec<String>,
}

/// Appends every record of `batch` to `table`, in batch order.
///
/// # Errors
///
/// - [`StoreError::MissingTable`], [`StoreError::UnknownColumn`],
///   [`StoreError::ReservedColumn`] or [`StoreError::ConflictingKeys`] if
///   the batch does not fit the table's
///   current schema. These are internal invariant violations: callers are
///   expected to [`synchronize`](crate::synchronize) first.
/// - [`StoreError::InsertionError`] if the write fails. Nothing from the
///   batch is committed.
pub fn insert_batch(conn: &Connection, table: &str, batch: &Batch) -> Result<InsertionSummary> {
    validate_table_name(table)?;
    let keys = batch.keys();
    check_fits(&current_columns(conn, table)?, table, &keys)?;

    let insert_err = |record: Option<usize>| {
        let table = table.to_string();
        move |source| StoreError::InsertionError {
            table,
            record,
            source,
        }
    };

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(insert_err(None))?;
    {
        let mut stmt = tx
            .prepare(&generate_insert_sql(table, &keys))
            .map_err(insert_err(None))?;
        for (index, record) in batch.records().iter().enumerate() {
            let values = keys.iter().map(|key| record.value(key));
            stmt.execute(params_from_iter(values))
                .map_err(insert_err(Some(index)))?;
        }
    }
    tx.commit().map_err(insert_err(None))?;

    debug!(table, rows = batch.len(), columns = keys.len(), "inserted batch");
    Ok(InsertionSummary {
        rows_inserted: batch.len(),
        columns_detected: keys,
    })
}

fn check_fits(columns: &TableColumns, table: &str, keys: &[String]) -> Result<()> {
    if !columns.exists() {
        return Err(StoreError::MissingTable(table.to_string()));
    }
    if let Some(key) = keys.iter().find(|k| k.eq_ignore_ascii_case(IDENTITY_COLUMN)) {
        return Err(StoreError::ReservedColumn {
            table: table.to_string(),
            column: key.clone(),
        });
    }
    if let Some((first, second)) = case_conflict(keys) {
        return Err(StoreError::ConflictingKeys {
            table: table.to_string(),
            first: first.clone(),
            second: second.clone(),
        });
    }
    if let Some(key) = keys.iter().find(|k| !columns.contains(k)) {
        return Err(StoreError::UnknownColumn {
            table: table.to_string(),
            column: key.clone(),
        });
    }
    Ok(())
}
