//! Read-only inspection of a managed table's persisted shape.

use rusqlite::{Connection, params};
use tracing::debug;

use crate::error::Result;

/// The persisted shape of a table, as seen by [`current_columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableColumns {
    /// The table has never been created. Not an error.
    TableAbsent,
    /// The table exists with these columns, in declaration order (including
    /// the identity column).
    Present(Vec<String>),
}

impl TableColumns {
    pub fn exists(&self) -> bool {
        matches!(self, TableColumns::Present(_))
    }

    /// The column names, empty when the table is absent.
    pub fn names(&self) -> &[String] {
        match self {
            TableColumns::TableAbsent => &[],
            TableColumns::Present(names) => names,
        }
    }

    /// Column lookup is ASCII case-insensitive, as in SQLite.
    pub fn contains(&self, column: &str) -> bool {
        self.names().iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    /// Keys from `incoming` that are not yet columns, keeping their order.
    pub fn missing<'k>(&self, incoming: &'k [String]) -> Vec<&'k String> {
        incoming.iter().filter(|k| !self.contains(k)).collect()
    }
}

/// Checks whether `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare_cached("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
    let count: i64 = stmt.query_row([table], |row| row.get(0))?;
    Ok(count > 0)
}

/// Returns the current column set of `table`, or [`TableColumns::TableAbsent`].
///
/// Has no side effects.
pub fn current_columns(conn: &Connection, table: &str) -> Result<TableColumns> {
    if !table_exists(conn, table)? {
        debug!(table, "table absent");
        return Ok(TableColumns::TableAbsent);
    }
    let mut stmt = conn.prepare_cached("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(table, columns = names.len(), "inspected table");
    Ok(TableColumns::Present(names))
}

/// Counts rows in `table`, zero when the table is absent.
pub fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    if !table_exists(conn, table)? {
        return Ok(0);
    }
    let sql = format!("SELECT COUNT(*) FROM {}", crate::schema::quote_ident(table));
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as usize)
}
