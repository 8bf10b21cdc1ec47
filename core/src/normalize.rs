//! Raw table to record normalization.
//!
//! Header cells become storage-safe column names and data rows become
//! [`Record`]s keyed by those names. Width mismatches are resolved
//! positionally: short rows are padded with `NULL`, long rows are truncated.
//!
//! # Examples
//!
//! ```
//! use tabsync_core::{normalize_header, normalize_tables, RawTable};
//!
//! assert_eq!(normalize_header(Some("Amount (in Rs.)")), "amount_in_rs");
//! assert_eq!(normalize_header(None), "unknown_col");
//!
//! let table = RawTable::from_text([
//!     vec![Some("Date"), Some("Amount (in Rs.)")],
//!     vec![Some("2024-01-01"), Some("100")],
//!     vec![None, Some("")],
//! ]);
//! let batch = normalize_tables(&[table]);
//! assert_eq!(batch.len(), 1);
//! assert_eq!(batch.records()[0].value("amount_in_rs"), Some("100"));
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::{Batch, IDENTITY_COLUMN, RawCell, RawTable, Record};

/// Maximum length of a normalized column name, in characters.
pub const MAX_COLUMN_NAME_LEN: usize = 60;

/// Column name used when a header has no usable content and no position.
pub const UNKNOWN_COLUMN: &str = "unknown_col";

/// Converts a header cell to a storage-safe column name.
///
/// Characters outside `[A-Za-z0-9]` and whitespace are removed, whitespace
/// runs become a single `_`, the result is lowercased and cut to
/// [`MAX_COLUMN_NAME_LEN`] characters. An absent header, or one with nothing
/// left after cleaning, maps to [`UNKNOWN_COLUMN`].
pub fn normalize_header(header: Option<&str>) -> String {
    header
        .map(clean_header)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_COLUMN.to_string())
}

fn clean_header(raw: &str) -> String {
    static DISALLOWED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\s]").expect("static regex must compile"));
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("static regex must compile"));

    let stripped = DISALLOWED_RE.replace_all(raw, "");
    let joined = WHITESPACE_RE.replace_all(&stripped, "_");
    joined
        .to_lowercase()
        .chars()
        .take(MAX_COLUMN_NAME_LEN)
        .collect()
}

/// Normalizes a full header row into unique column names.
///
/// Absent or empty-after-cleaning headers become `col_<index>`. Names that
/// repeat within the row, or that collide with [`IDENTITY_COLUMN`], are
/// suffixed `_2`, `_3`, ... so that no value is ever overwritten.
pub fn normalize_headers(header: &[RawCell]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::from([IDENTITY_COLUMN.to_string()]);
    let mut names = Vec::with_capacity(header.len());

    for (index, cell) in header.iter().enumerate() {
        let text = cell.as_ref().map(ToString::to_string);
        let base = match text.as_deref().map(clean_header) {
            Some(name) if !name.is_empty() => name,
            _ => format!("col_{index}"),
        };
        let name = unique_name(&base, &taken);
        if name != base {
            debug!(header = %base, column = %name, "renamed duplicate header");
        }
        taken.insert(name.clone());
        names.push(name);
    }

    names
}

fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| {
            let suffix = format!("_{n}");
            let room = MAX_COLUMN_NAME_LEN.saturating_sub(suffix.len());
            let stem: String = base.chars().take(room).collect();
            format!("{stem}{suffix}")
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Stringifies a cell: newlines become spaces, surrounding whitespace is
/// trimmed, and empty results become `None`.
///
/// Only absent cells and blank text count as empty. Numeric zero and
/// `false` are data and stringify to `"0"` and `"false"`; a zero amount is
/// a real value in a statement.
pub fn clean_cell(cell: &RawCell) -> Option<String> {
    let text = cell.as_ref()?.to_string();
    let cleaned = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let trimmed = cleaned.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Cleans a row and fits it to `width` cells.
///
/// Short rows are right-padded with `None`; long rows are right-truncated.
pub fn fit_row(row: &[RawCell], width: usize) -> Vec<Option<String>> {
    let mut cells: Vec<Option<String>> = row.iter().take(width).map(clean_cell).collect();
    cells.resize(width, None);
    cells
}

/// Builds a record from normalized column names and a raw data row.
///
/// Returns `None` when every cell of the row is empty (absent or blank, see
/// [`clean_cell`]); such rows carry no data and are dropped. A row of zeros
/// or `false` values is kept.
pub fn normalize_row(columns: &[String], row: &[RawCell]) -> Option<Record> {
    if row.iter().all(|cell| clean_cell(cell).is_none()) {
        return None;
    }
    let values = fit_row(row, columns.len());
    Some(columns.iter().cloned().zip(values).collect())
}

/// Normalizes a single data row against a raw header row.
pub fn normalize(header: &[RawCell], row: &[RawCell]) -> Option<Record> {
    normalize_row(&normalize_headers(header), row)
}

/// Normalizes every data row of one table.
///
/// Tables with fewer than two rows (a header and at least one data row)
/// contribute nothing.
pub fn normalize_table(table: &RawTable) -> Vec<Record> {
    let Some(header) = table.header() else {
        return Vec::new();
    };
    if table.data_rows().is_empty() {
        return Vec::new();
    }

    let columns = normalize_headers(header);
    table
        .data_rows()
        .iter()
        .filter_map(|row| normalize_row(&columns, row))
        .collect()
}

/// Flattens every table into one batch, preserving table and row order.
pub fn normalize_tables(tables: &[RawTable]) -> Batch {
    let batch: Batch = tables.iter().flat_map(normalize_table).collect();
    debug!(tables = tables.len(), records = batch.len(), "normalized extraction output");
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn text(cells: &[Option<&str>]) -> Vec<RawCell> {
        cells.iter().map(|c| c.map(CellValue::from)).collect()
    }

    #[test]
    fn test_normalize_header_examples() {
        assert_eq!(normalize_header(Some("Amount (in Rs.)")), "amount_in_rs");
        assert_eq!(normalize_header(Some("Txn\nDate")), "txn_date");
        assert_eq!(normalize_header(Some("  Net   Total ")), "_net_total_");
        assert_eq!(normalize_header(None), "unknown_col");
        assert_eq!(normalize_header(Some("")), "unknown_col");
        assert_eq!(normalize_header(Some("%%%")), "unknown_col");
    }

    #[test]
    fn test_normalize_header_truncates() {
        let long = "A".repeat(90);
        let name = normalize_header(Some(&long));
        assert_eq!(name.len(), MAX_COLUMN_NAME_LEN);
        assert!(name.chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_normalize_header_drops_non_ascii_letters() {
        assert_eq!(normalize_header(Some("Café Total")), "caf_total");
    }

    #[test]
    fn test_headers_missing_become_positional() {
        let names = normalize_headers(&text(&[Some("Date"), None, Some("??")]));
        assert_eq!(names, vec!["date", "col_1", "col_2"]);
    }

    #[test]
    fn test_headers_duplicates_get_suffix() {
        let names = normalize_headers(&text(&[
            Some("Amount"),
            Some("amount"),
            Some("AMOUNT!"),
            Some("Amount 2"),
        ]));
        assert_eq!(names, vec!["amount", "amount_2", "amount_3", "amount_2_2"]);
    }

    #[test]
    fn test_headers_identity_column_is_reserved() {
        let names = normalize_headers(&text(&[Some("ID"), Some("Name")]));
        assert_eq!(names, vec!["id_2", "name"]);
    }

    #[test]
    fn test_duplicate_suffix_respects_length_limit() {
        let long = "b".repeat(70);
        let names = normalize_headers(&text(&[Some(long.as_str()), Some(long.as_str())]));
        assert_eq!(names[0].len(), MAX_COLUMN_NAME_LEN);
        assert_eq!(names[1].len(), MAX_COLUMN_NAME_LEN);
        assert!(names[1].ends_with("_2"));
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn test_clean_cell() {
        assert_eq!(clean_cell(&Some("  a\nb ".into())), Some("a b".to_string()));
        assert_eq!(clean_cell(&Some("x\r\ny".into())), Some("x y".to_string()));
        assert_eq!(clean_cell(&Some("   ".into())), None);
        assert_eq!(clean_cell(&Some("".into())), None);
        assert_eq!(clean_cell(&None), None);
        assert_eq!(clean_cell(&Some(CellValue::Integer(0))), Some("0".to_string()));
    }

    #[test]
    fn test_short_row_is_padded_to_header_width() {
        let columns: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let record = normalize_row(&columns, &text(&[Some("1")])).unwrap();
        assert_eq!(record.len(), 4);
        let values: Vec<_> = record.iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![Some("1"), None, None, None]);
    }

    #[test]
    fn test_long_row_is_truncated() {
        let columns = vec!["a".to_string()];
        let record = normalize_row(&columns, &text(&[Some("1"), Some("2"), Some("3")])).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.value("a"), Some("1"));
    }

    #[test]
    fn test_empty_row_is_dropped() {
        let header = text(&[Some("A"), Some("B"), Some("C")]);
        assert!(normalize(&header, &text(&[None, Some(""), None])).is_none());
        assert!(normalize(&header, &[]).is_none());
    }

    #[test]
    fn test_zero_and_false_row_is_kept() {
        let header = text(&[Some("A"), Some("B")]);
        let row = vec![Some(CellValue::Integer(0)), Some(CellValue::Bool(false))];
        let record = normalize(&header, &row).unwrap();
        assert_eq!(record.value("a"), Some("0"));
        assert_eq!(record.value("b"), Some("false"));
    }

    #[test]
    fn test_row_with_data_only_past_header_is_kept_as_nulls() {
        let header = text(&[Some("A")]);
        let record = normalize(&header, &text(&[None, Some("overflow")])).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.value("a"), None);
    }

    #[test]
    fn test_table_needs_header_and_data() {
        assert!(normalize_table(&RawTable::default()).is_empty());
        let header_only = RawTable::from_text([vec![Some("A"), Some("B")]]);
        assert!(normalize_table(&header_only).is_empty());
    }

    #[test]
    fn test_normalize_tables_concatenates_in_order() {
        let first = RawTable::from_text([
            vec![Some("Date"), Some("Amount")],
            vec![Some("2024-01-01"), Some("100")],
        ]);
        let second = RawTable::from_text([
            vec![Some("Vendor")],
            vec![Some("Acme")],
            vec![Some("Globex")],
        ]);
        let batch = normalize_tables(&[first, second]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.records()[0].value("date"), Some("2024-01-01"));
        assert_eq!(batch.records()[2].value("vendor"), Some("Globex"));
        assert_eq!(batch.keys(), vec!["date", "amount", "vendor"]);
    }

    #[test]
    fn test_normalize_tables_empty_input() {
        assert!(normalize_tables(&[]).is_empty());
    }
}
