//! Runtime settings for the ingestion service.
//!
//! Settings are loaded from a YAML file, then overridden from the process
//! environment, then (by the CLI) from command-line flags.
//!
//! # Example YAML
//!
//! ```yaml
//! project_name: OneStack Financial Parser
//! database_path: ./financial_data.db
//! table_name: financial_records
//! upload_dir: data/uploads
//! max_file_size_mb: 10
//! busy_timeout_ms: 5000
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding [`Settings::database_path`].
pub const ENV_DATABASE_PATH: &str = "TABSYNC_DATABASE_PATH";
/// Environment variable overriding [`Settings::table_name`].
pub const ENV_TABLE_NAME: &str = "TABSYNC_TABLE_NAME";
/// Environment variable overriding [`Settings::upload_dir`].
pub const ENV_UPLOAD_DIR: &str = "TABSYNC_UPLOAD_DIR";
/// Environment variable overriding [`Settings::max_file_size_mb`].
pub const ENV_MAX_FILE_SIZE_MB: &str = "TABSYNC_MAX_FILE_SIZE_MB";
/// Environment variable overriding [`Settings::busy_timeout_ms`].
pub const ENV_BUSY_TIMEOUT_MS: &str = "TABSYNC_BUSY_TIMEOUT_MS";

/// Service configuration.
///
/// # Examples
///
/// ```
/// use tabsync_core::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.table_name, "financial_records");
/// assert_eq!(settings.max_file_size_bytes(), 10 * 1024 * 1024);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Human-readable service name.
    pub project_name: String,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// The one table all batches are written to.
    pub table_name: String,
    /// Directory where inputs are staged while they are processed.
    pub upload_dir: PathBuf,
    /// Largest accepted input, in mebibytes.
    pub max_file_size_mb: u64,
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_name: "OneStack Financial Parser".to_string(),
            database_path: PathBuf::from("./financial_data.db"),
            table_name: "financial_records".to_string(),
            upload_dir: PathBuf::from("data/uploads"),
            max_file_size_mb: 10,
            busy_timeout_ms: 5000,
        }
    }
}

impl Settings {
    /// Loads settings from a YAML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be read, or
    /// [`ConfigError::YamlError`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let settings = serde_yaml::from_reader(reader)?;
        Ok(settings)
    }

    /// Saves the settings as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup, keyed by the `TABSYNC_*`
    /// variable names.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(table) = lookup(ENV_TABLE_NAME) {
            self.table_name = table;
        }
        if let Some(dir) = lookup(ENV_UPLOAD_DIR) {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(size) = lookup(ENV_MAX_FILE_SIZE_MB) {
            self.max_file_size_mb = parse_number("max_file_size_mb", &size)?;
        }
        if let Some(timeout) = lookup(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = parse_number("busy_timeout_ms", &timeout)?;
        }
        Ok(())
    }

    /// Checks that the settings can be used to open a store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the table name is empty or
    /// contains characters other than ASCII alphanumerics and underscores,
    /// or when the size limit is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if !is_valid_table_name(&self.table_name) {
            return Err(ConfigError::Invalid {
                key: "table_name",
                reason: format!(
                    "'{}' must be non-empty and contain only ASCII letters, digits and underscores",
                    self.table_name
                ),
            });
        }
        if self.max_file_size_mb == 0 {
            return Err(ConfigError::Invalid {
                key: "max_file_size_mb",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The size limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Returns `true` if `name` is usable as a managed table name.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_number(key: &'static str, raw: &str) -> ConfigResult<u64> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("'{raw}' is not a non-negative integer"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_partial_yaml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabsync.yml");
        std::fs::write(&path, "table_name: invoices\nmax_file_size_mb: 2\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.table_name, "invoices");
        assert_eq!(settings.max_file_size_mb, 2);
        assert_eq!(settings.upload_dir, PathBuf::from("data/uploads"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabsync.yml");
        let mut settings = Settings::default();
        settings.table_name = "statements".to_string();
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Settings::load("/nonexistent/tabsync.yml"),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATABASE_PATH, "/tmp/other.db"),
            (ENV_TABLE_NAME, "ledger"),
            (ENV_BUSY_TIMEOUT_MS, "250"),
        ]);
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(settings.table_name, "ledger");
        assert_eq!(settings.busy_timeout_ms, 250);
        assert_eq!(settings.max_file_size_mb, 10);
    }

    #[test]
    fn test_override_rejects_bad_number() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|key| (key == ENV_MAX_FILE_SIZE_MB).then(|| "ten".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "max_file_size_mb", .. }));
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        settings.table_name = "drop;--".to_string();
        assert!(settings.validate().is_err());

        settings.table_name = String::new();
        assert!(settings.validate().is_err());

        settings.table_name = "ok_name_1".to_string();
        settings.max_file_size_mb = 0;
        assert!(settings.validate().is_err());
    }
}
