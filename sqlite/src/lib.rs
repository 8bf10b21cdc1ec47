//! SQLite storage engine for sparse, schema-less tabular records.
//!
//! This crate persists [`Batch`](tabsync_core::Batch)es of flat records into
//! one SQLite table whose shape is not known in advance. New keys become new
//! nullable `TEXT` columns; columns are never removed.
//!
//! # Architecture
//!
//! The crate is organized into six modules:
//!
//! - **`schema`**: SQL generation and identifier quoting
//! - **`inspect`**: reads the current column set of a table
//! - **`migration`**: additive, transactional schema synchronization
//! - **`insert`**: batch insertion against the synchronized schema
//! - **`query`**: read-back of all persisted records
//! - **`store`**: the long-lived [`Store`] handle tying them together
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//! use tabsync_core::JsonTableSource;
//! use tabsync_sqlite::{BatchOutcome, Store};
//!
//! let store = Store::open("financial_data.db", "financial_records", Duration::from_secs(5)).unwrap();
//!
//! match store.ingest(&JsonTableSource::new("statement.json")).unwrap() {
//!     BatchOutcome::Skipped { reason } => println!("skipped: {reason}"),
//!     BatchOutcome::Success { rows_inserted, .. } => println!("{rows_inserted} rows stored"),
//! }
//!
//! for record in store.list_all_records().unwrap() {
//!     println!("{}", serde_json::to_string(&record).unwrap());
//! }
//! store.close().unwrap();
//! ```
//!
//! # Lower-level access
//!
//! [`current_columns`], [`synchronize`], [`insert_batch`] and [`fetch_all`]
//! operate on any `rusqlite::Connection` and can be composed directly.

mod error;
mod insert;
mod inspect;
mod migration;
mod query;
mod schema;
mod store;

pub use error::{ErrorKind, Result, StoreError};
pub use insert::{InsertionSummary, insert_batch};
pub use inspect::{TableColumns, count_rows, current_columns, table_exists};
pub use migration::{SyncReport, synchronize};
pub use query::{StoredRecord, fetch_all};
pub use schema::{
    generate_add_column_sql, generate_create_table_sql, generate_insert_sql,
    generate_select_all_sql, quote_ident,
};
pub use store::{BatchOutcome, SKIPPED_REASON, Store, StoreStatus};
