//! Read-back of persisted records.
//!
//! Rows come back as generic key/value mappings: the identity value plus
//! every other column in declaration order. A table that was never created
//! reads as empty.

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tabsync_core::{IDENTITY_COLUMN, Record};

use crate::error::{Result, StoreError};
use crate::inspect::table_exists;
use crate::schema::{generate_select_all_sql, validate_table_name};

/// One persisted row.
///
/// Serializes as a flat JSON object with the identity column first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: i64,
    pub fields: Record,
}

impl StoredRecord {
    /// The non-null value of `column`, if any.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.fields.value(column)
    }
}

impl Serialize for StoredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(IDENTITY_COLUMN, &self.id)?;
        for (key, value) in self.fields.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

/// Returns every row of `table` in identity order, or an empty vector when
/// the table does not exist.
///
/// # Errors
///
/// Returns [`StoreError::DatabaseError`] if the read fails.
pub fn fetch_all(conn: &Connection, table: &str) -> Result<Vec<StoredRecord>> {
    validate_table_name(table)?;
    if !table_exists(conn, table)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&generate_select_all_sql(table))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let id_index = names
        .iter()
        .position(|n| n.eq_ignore_ascii_case(IDENTITY_COLUMN))
        .ok_or_else(|| StoreError::UnknownColumn {
            table: table.to_string(),
            column: IDENTITY_COLUMN.to_string(),
        })?;

    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(id_index)?;
        let mut fields = Record::new();
        for (index, name) in names.iter().enumerate() {
            if index == id_index {
                continue;
            }
            fields.insert(name.clone(), value_as_text(row.get_ref(index)?));
        }
        Ok(StoredRecord { id, fields })
    })?;

    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Renders any stored value as text. Managed columns only ever hold text,
/// but rows written by other tools may not.
fn value_as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
