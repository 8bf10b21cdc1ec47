//! SQL generation for dynamically shaped tables.
//!
//! A managed table always has one generated identity column plus any number
//! of nullable `TEXT` columns. Column names come from untrusted documents, so
//! every identifier is quoted; table names are additionally restricted to
//! ASCII alphanumerics and underscores.
//!
//! # Table structure
//!
//! ```sql
//! CREATE TABLE "financial_records" (
//!     "id" INTEGER PRIMARY KEY AUTOINCREMENT,
//!     "date" TEXT,
//!     "amount_in_rs" TEXT
//! );
//! ```

use tabsync_core::{IDENTITY_COLUMN, is_valid_table_name};

use crate::error::{Result, StoreError};

/// Validates that a table name contains only ASCII alphanumerics and underscores.
pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    if !is_valid_table_name(table) {
        return Err(StoreError::InvalidTableName(table.to_string()));
    }
    Ok(())
}

/// Drops keys that repeat an earlier key up to ASCII case; the first
/// spelling wins, as SQLite column names are case-insensitive.
pub(crate) fn distinct_columns(keys: &[String]) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        if !distinct.iter().any(|k| k.eq_ignore_ascii_case(key)) {
            distinct.push(key.clone());
        }
    }
    distinct
}

/// Returns the first pair of keys that differ only in ASCII case.
pub(crate) fn case_conflict(keys: &[String]) -> Option<(&String, &String)> {
    keys.iter().enumerate().find_map(|(i, first)| {
        keys[i + 1..]
            .iter()
            .find(|second| second.eq_ignore_ascii_case(first))
            .map(|second| (first, second))
    })
}

/// Quotes an SQL identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generates `CREATE TABLE` with the identity column and one nullable text
/// column per key, in the given order.
///
/// `IF NOT EXISTS` keeps a lost creation race from failing; the caller
/// re-inspects and adds whatever the winner did not create.
pub fn generate_create_table_sql(table: &str, columns: &[String]) -> String {
    let mut defs = vec![format!(
        "    {} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(IDENTITY_COLUMN)
    )];
    defs.extend(
        columns
            .iter()
            .filter(|c| c.as_str() != IDENTITY_COLUMN)
            .map(|c| format!("    {} TEXT", quote_ident(c))),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        quote_ident(table),
        defs.join(",\n")
    )
}

/// Generates an additive `ALTER TABLE ... ADD COLUMN` for a nullable text column.
pub fn generate_add_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} TEXT",
        quote_ident(table),
        quote_ident(column)
    )
}

/// Generates a positional `INSERT` for the given columns.
///
/// With no columns, every column takes its default (`NULL`, or the next
/// identity value).
pub fn generate_insert_sql(table: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table));
    }
    let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Generates a full-table read in identity order.
pub fn generate_select_all_sql(table: &str) -> String {
    format!(
        "SELECT * FROM {} ORDER BY {}",
        quote_ident(table),
        quote_ident(IDENTITY_COLUMN)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_table_name() {
        assert!(validate_table_name("financial_records").is_ok());
        assert!(validate_table_name("T2024").is_ok());
    }

    #[test]
    fn test_invalid_table_name() {
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("drop;--").is_err());
        assert!(validate_table_name("two words").is_err());
        assert!(validate_table_name("naïve").is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("amount"), "\"amount\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_create_table_sql() {
        let sql = generate_create_table_sql("records", &cols(&["date", "2024"]));
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"records\""));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"date\" TEXT"));
        assert!(sql.contains("\"2024\" TEXT"));
        assert!(sql.find("\"date\"").unwrap() < sql.find("\"2024\"").unwrap());
    }

    #[test]
    fn test_create_table_sql_skips_identity_key() {
        let sql = generate_create_table_sql("records", &cols(&["id", "name"]));
        assert_eq!(sql.matches("\"id\"").count(), 1);
    }

    #[test]
    fn test_create_table_sql_executes() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_create_table_sql("t", &cols(&["a", "b c"])))
            .unwrap();
        conn.execute(&generate_insert_sql("t", &cols(&["b c"])), ["x"])
            .unwrap();
        conn.execute(&generate_insert_sql("t", &[]), []).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_add_column_sql() {
        assert_eq!(
            generate_add_column_sql("records", "vendor"),
            "ALTER TABLE \"records\" ADD COLUMN \"vendor\" TEXT"
        );
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            generate_insert_sql("records", &cols(&["a", "b"])),
            "INSERT INTO \"records\" (\"a\", \"b\") VALUES (?1, ?2)"
        );
        assert_eq!(
            generate_insert_sql("records", &[]),
            "INSERT INTO \"records\" DEFAULT VALUES"
        );
    }

    #[test]
    fn test_select_all_sql() {
        assert_eq!(
            generate_select_all_sql("records"),
            "SELECT * FROM \"records\" ORDER BY \"id\""
        );
    }

    #[test]
    fn test_distinct_columns_ignores_case() {
        assert_eq!(
            distinct_columns(&cols(&["Vendor", "date", "vendor", "DATE"])),
            cols(&["Vendor", "date"])
        );
    }

    #[test]
    fn test_case_conflict() {
        let keys = cols(&["date", "Vendor", "amount", "vendor"]);
        let (first, second) = case_conflict(&keys).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("Vendor", "vendor"));
        assert!(case_conflict(&cols(&["date", "vendor"])).is_none());
    }
}
