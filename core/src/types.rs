//! Data model shared by the normalizer and the storage engine.
//!
//! Upstream extraction produces [`RawTable`]s made of [`RawCell`]s. The
//! normalizer flattens them into [`Record`]s, collected in a [`Batch`]
//! destined for one logical table.

use std::collections::HashSet;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

/// Name of the generated identity column present in every managed table.
///
/// Callers never supply a value for it; the normalizer reserves the name so
/// that no header can collide with it.
pub const IDENTITY_COLUMN: &str = "id";

/// A scalar value extracted from a document cell.
///
/// Documents mostly produce text, but JSON-based extractors may hand over
/// numbers or booleans. All of them are stored as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Integer(n) => write!(f, "{n}"),
            CellValue::Float(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// One cell of a raw table; `None` is an absent cell.
pub type RawCell = Option<CellValue>;

/// One row of a raw table.
pub type RawRow = Vec<RawCell>;

/// A table as handed over by the document extractor.
///
/// The first row is the header row; every following row is data.
///
/// # Examples
///
/// ```
/// use tabsync_core::RawTable;
///
/// let table: RawTable = serde_json::from_str(r#"[["Date", null], ["2024-01-01", "100"]]"#).unwrap();
/// assert_eq!(table.rows().len(), 2);
/// assert!(table.header().unwrap()[1].is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTable {
    rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }

    /// Builds a table from optional string cells, mostly for tests and fixtures.
    pub fn from_text<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = Option<&'static str>>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.map(CellValue::from)).collect())
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    /// Returns the header row, if any.
    pub fn header(&self) -> Option<&RawRow> {
        self.rows.first()
    }

    /// Returns the data rows (everything after the header).
    pub fn data_rows(&self) -> &[RawRow] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// A flat, ordered set of `(column, value)` pairs.
///
/// Keys are unique; inserting an existing key replaces its value in place.
/// Values are `None` for SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field, returning the previous value when the key
    /// was already present.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Option<String>,
    ) -> Option<Option<String>> {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.fields.push((key, value));
        None
    }

    /// Returns the non-null value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v.map(Into::into));
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// An ordered sequence of records destined for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct keys across all records, in first-seen order.
    ///
    /// The order is deterministic for a given batch, which makes the column
    /// order of a freshly created table reproducible.
    pub fn keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for key in self.records.iter().flat_map(Record::keys) {
            if seen.insert(key) {
                keys.push(key.to_string());
            }
        }
        keys
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Batch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_insert_replaces_in_place() {
        let mut record = Record::new();
        assert_eq!(record.insert("a", Some("1".into())), None);
        record.insert("b", None);
        assert_eq!(record.insert("a", Some("2".into())), Some(Some("1".into())));

        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.value("a"), Some("2"));
        assert_eq!(record.value("b"), None);
        assert!(record.contains_key("b"));
        assert!(!record.contains_key("c"));
    }

    #[test]
    fn test_record_serializes_as_ordered_object() {
        let record: Record = [("zeta", Some("1")), ("alpha", None)].into_iter().collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":null}"#);
    }

    #[test]
    fn test_batch_keys_first_seen_order() {
        let batch = Batch::new(vec![
            [("date", Some("x")), ("amount", Some("1"))].into_iter().collect(),
            [("vendor", Some("y")), ("date", None)].into_iter().collect(),
        ]);
        assert_eq!(batch.keys(), vec!["date", "amount", "vendor"]);
    }

    #[test]
    fn test_raw_table_mixed_cells() {
        let table: RawTable =
            serde_json::from_str(r#"[["A", "B", "C", "D"], ["x", 3, 1.5, true], [null]]"#).unwrap();
        let row = &table.data_rows()[0];
        assert_eq!(row[0], Some(CellValue::Text("x".into())));
        assert_eq!(row[1], Some(CellValue::Integer(3)));
        assert_eq!(row[2], Some(CellValue::Float(1.5)));
        assert_eq!(row[3], Some(CellValue::Bool(true)));
        assert_eq!(table.data_rows()[1], vec![None]);
    }

    #[test]
    fn test_raw_table_without_rows() {
        let table = RawTable::default();
        assert!(table.header().is_none());
        assert!(table.data_rows().is_empty());
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Integer(100).to_string(), "100");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(false).to_string(), "false");
    }
}
