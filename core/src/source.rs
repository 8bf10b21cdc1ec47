//! Upstream table sources.
//!
//! The document extractor is an external collaborator. Whatever it is, it
//! hands over zero or more [`RawTable`]s through the [`TableSource`] trait;
//! this crate ships a JSON file implementation that accepts either a bare
//! array of tables or an object with a `tables` array.
//!
//! ```json
//! {"tables": [[["Date", "Amount (in Rs.)"], ["2024-01-01", "100"]]]}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::UpstreamError;
use crate::types::RawTable;

/// A producer of raw tables extracted from one document.
pub trait TableSource {
    /// Returns every table found in the document, in document order.
    fn tables(&self) -> Result<Vec<RawTable>, UpstreamError>;
}

impl TableSource for Vec<RawTable> {
    fn tables(&self) -> Result<Vec<RawTable>, UpstreamError> {
        Ok(self.clone())
    }
}

impl TableSource for [RawTable] {
    fn tables(&self) -> Result<Vec<RawTable>, UpstreamError> {
        Ok(self.to_vec())
    }
}

#[derive(Deserialize)]
struct TablesDocument {
    tables: Vec<RawTable>,
}

/// Parses extraction output from a JSON string.
///
/// # Errors
///
/// Returns [`UpstreamError::Json`] for malformed JSON and
/// [`UpstreamError::InvalidShape`] when the document is neither an array of
/// tables nor an object with a `tables` field.
pub fn parse_tables_json(input: &str) -> Result<Vec<RawTable>, UpstreamError> {
    let value: Value = serde_json::from_str(input)?;
    let has_tables = matches!(&value, Value::Object(map) if map.contains_key("tables"));
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(_) if has_tables => {
            let doc: TablesDocument = serde_json::from_value(value)?;
            Ok(doc.tables)
        }
        Value::Object(_) => Err(UpstreamError::InvalidShape(
            "object is missing a 'tables' array".to_string(),
        )),
        other => Err(UpstreamError::InvalidShape(format!(
            "expected an array of tables, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Extraction output stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonTableSource {
    path: PathBuf,
}

impl JsonTableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for JsonTableSource {
    fn tables(&self) -> Result<Vec<RawTable>, UpstreamError> {
        let content = fs::read_to_string(&self.path)?;
        parse_tables_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_bare_array() {
        let tables = parse_tables_json(r#"[[["A"], ["1"]], [["B"]]]"#).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows().len(), 2);
    }

    #[test]
    fn test_parse_tables_object() {
        let tables = parse_tables_json(r#"{"tables": [[["A", null], ["1", "2"]]], "pages": 3}"#).unwrap();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].header().unwrap()[1].is_none());
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_tables_json("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(matches!(
            parse_tables_json(r#"{"rows": []}"#),
            Err(UpstreamError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_tables_json("42"),
            Err(UpstreamError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_tables_json("[[[{}]]]"),
            Err(UpstreamError::Json(_))
        ));
        assert!(matches!(parse_tables_json("{"), Err(UpstreamError::Json(_))));
    }

    #[test]
    fn test_json_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[[["Vendor"], ["Acme"]]]"#).unwrap();
        file.flush().unwrap();

        let source = JsonTableSource::new(file.path());
        let tables = source.tables().unwrap();
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn test_json_file_source_missing_file() {
        let source = JsonTableSource::new("/nonexistent/extraction.json");
        assert!(matches!(source.tables(), Err(UpstreamError::Io(_))));
    }
}
