//! Record model and normalization for dynamic-schema table ingestion.
//!
//! This crate covers everything that happens before storage:
//!
//! - [`RawTable`] / [`RawCell`]: the shape handed over by a document
//!   extractor (first row is the header row).
//! - [`normalize_tables`] and friends: turn raw tables into a [`Batch`] of
//!   flat [`Record`]s with storage-safe, unique column names.
//! - [`TableSource`]: the upstream collaborator contract, with a JSON file
//!   implementation ([`JsonTableSource`]).
//! - [`Settings`]: YAML/environment configuration.
//!
//! # Example
//!
//! ```
//! use tabsync_core::*;
//!
//! let tables = parse_tables_json(
//!     r#"[[["Date", "Amount (in Rs.)", "Amount (in Rs.)"], ["2024-01-01", "100", "5"]]]"#,
//! )
//! .unwrap();
//! let batch = normalize_tables(&tables);
//!
//! assert_eq!(batch.keys(), vec!["date", "amount_in_rs", "amount_in_rs_2"]);
//! assert_eq!(batch.records()[0].value("amount_in_rs_2"), Some("5"));
//! ```

mod config;
mod error;
mod normalize;
mod source;
mod types;

pub use config::{
    ENV_BUSY_TIMEOUT_MS, ENV_DATABASE_PATH, ENV_MAX_FILE_SIZE_MB, ENV_TABLE_NAME, ENV_UPLOAD_DIR,
    Settings, is_valid_table_name,
};
pub use error::{ConfigError, ConfigResult, UpstreamError};
pub use normalize::{
    MAX_COLUMN_NAME_LEN, UNKNOWN_COLUMN, clean_cell, fit_row, normalize, normalize_header,
    normalize_headers, normalize_row, normalize_table, normalize_tables,
};
pub use source::{JsonTableSource, TableSource, parse_tables_json};
pub use types::{Batch, CellValue, IDENTITY_COLUMN, RawCell, RawRow, RawTable, Record};
