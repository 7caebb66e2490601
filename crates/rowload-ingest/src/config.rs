//! Loader configuration
//!
//! Read once from a YAML file, overridden by environment variables and then
//! by CLI flags, validated, and passed explicitly to the orchestrator.

use rowload_common::{Result, RowloadError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::orchestrator::LoadSettings;
use crate::reader::Dialect;
use crate::schema::{ColumnSpec, RowSchema};

// ============================================================================
// Defaults
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/rowload";

/// Default maximum database connections. Files are loaded sequentially.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_ROOT_DIR: &str = ".";
pub const DEFAULT_EXTENSION: &str = "txt";
pub const DEFAULT_DELIMITER: &str = ";";
pub const DEFAULT_ENCODING: &str = "latin-1";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_SKIP_LOG: &str = "./logs/skipped_rows.log";

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Full loader configuration (rowload.yml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoaderConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Target table, optionally schema-qualified
    pub table: String,

    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// File extension to load, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// WHATWG encoding label (latin-1, utf-8, windows-1252, ...)
    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_skip_log")]
    pub skip_log: PathBuf,

    pub columns: Vec<ColumnSpec>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT_DIR)
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_skip_log() -> PathBuf {
    PathBuf::from(DEFAULT_SKIP_LOG)
}

impl LoaderConfig {
    /// Load configuration from a YAML file, without overrides or validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RowloadError::ConfigNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `.env` and environment variable overrides
    ///
    /// Environment variables:
    /// - `DATABASE_URL`
    /// - `ROWLOAD_TABLE`
    /// - `ROWLOAD_ROOT_DIR`
    /// - `ROWLOAD_BATCH_SIZE`
    /// - `ROWLOAD_SKIP_LOG`
    pub fn apply_env(mut self) -> Result<Self> {
        dotenvy::dotenv().ok();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(table) = std::env::var("ROWLOAD_TABLE") {
            self.table = table;
        }
        if let Ok(root) = std::env::var("ROWLOAD_ROOT_DIR") {
            self.root_dir = PathBuf::from(root);
        }
        if let Ok(size) = std::env::var("ROWLOAD_BATCH_SIZE") {
            self.batch_size = size.trim().parse().map_err(|_| {
                RowloadError::config(format!("ROWLOAD_BATCH_SIZE is not a number: '{}'", size))
            })?;
        }
        if let Ok(path) = std::env::var("ROWLOAD_SKIP_LOG") {
            self.skip_log = PathBuf::from(path);
        }

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(RowloadError::config("Database URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(RowloadError::config(
                "Database max_connections must be greater than 0",
            ));
        }

        validate_table_name(&self.table)?;

        if self.batch_size == 0 {
            return Err(RowloadError::config("batch_size must be greater than 0"));
        }

        if self.extension.trim_start_matches('.').is_empty() {
            return Err(RowloadError::config("extension cannot be empty"));
        }

        self.dialect()?;
        self.schema()?;

        Ok(())
    }

    /// Resolve delimiter and encoding
    pub fn dialect(&self) -> Result<Dialect> {
        let delimiter = match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => {
                return Err(RowloadError::config(format!(
                    "delimiter must be a single ASCII character, got '{}'",
                    self.delimiter
                )))
            },
        };

        Dialect::from_label(delimiter, &self.encoding).ok_or_else(|| {
            RowloadError::config(format!("Unknown encoding label '{}'", self.encoding))
        })
    }

    pub fn schema(&self) -> Result<RowSchema> {
        RowSchema::new(self.columns.clone()).map_err(|e| RowloadError::config(e.to_string()))
    }

    /// Validate and turn this configuration into orchestrator input
    pub fn to_settings(&self) -> Result<LoadSettings> {
        self.validate()?;

        Ok(LoadSettings {
            table: self.table.clone(),
            schema: self.schema()?,
            root_dir: self.root_dir.clone(),
            extension: self.extension.trim_start_matches('.').to_string(),
            batch_size: self.batch_size,
            dialect: self.dialect()?,
            skip_log_path: Some(self.skip_log.clone()),
        })
    }
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_.]` is allowed
fn validate_table_name(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(RowloadError::config("table cannot be empty"));
    }

    let valid_parts = table.split('.').all(|part| {
        !part.is_empty()
            && !part.starts_with(|c: char| c.is_ascii_digit())
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });

    if !valid_parts {
        return Err(RowloadError::config(format!(
            "Invalid table name '{}': use letters, digits and underscores, optionally schema-qualified",
            table
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
table: loaded_rows
columns:
  - { name: column1, type: datetime }
  - { name: column3, type: int }
  - { name: column4, type: string, max_length: 10 }
"#;

    fn minimal() -> LoaderConfig {
        serde_yaml::from_str(MINIMAL).unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = minimal();
        assert_eq!(config.database, DatabaseConfig::default());
        assert_eq!(config.root_dir, PathBuf::from("."));
        assert_eq!(config.extension, "txt");
        assert_eq!(config.delimiter, ";");
        assert_eq!(config.encoding, "latin-1");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.skip_log, PathBuf::from("./logs/skipped_rows.log"));
        assert_eq!(config.columns[1].column_type, ColumnType::Integer);
        assert_eq!(config.columns[2].max_length, Some(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rowload.yml");
        fs::write(
            &path,
            r#"
database:
  url: postgresql://db/rows
  max_connections: 2
table: staging.rows
root_dir: ./data
delimiter: "|"
encoding: utf-8
batch_size: 250
columns:
  - { name: at, type: timestamp }
  - { name: label, type: text }
"#,
        )
        .unwrap();

        let config = LoaderConfig::load(&path).unwrap();
        assert_eq!(config.database.url, "postgresql://db/rows");
        assert_eq!(config.database.connect_timeout_secs, 10);

        let settings = config.to_settings().unwrap();
        assert_eq!(settings.table, "staging.rows");
        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.dialect.delimiter, b'|');
        assert_eq!(settings.dialect.encoding, encoding_rs::UTF_8);
        assert_eq!(settings.schema.names(), vec!["at", "label"]);
    }

    #[test]
    fn test_missing_file() {
        let err = LoaderConfig::load("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, RowloadError::ConfigNotFound(_)));
    }

    #[test]
    fn test_unknown_column_type_is_a_yaml_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "table: t\ncolumns:\n  - { name: a, type: float }\n").unwrap();
        assert!(matches!(LoaderConfig::load(&path).unwrap_err(), RowloadError::Yaml(_)));
    }

    #[test]
    fn test_validation_failures() {
        let cases: [(&str, fn(&mut LoaderConfig)); 13] = [
            ("url", |c: &mut LoaderConfig| c.database.url = " ".into()),
            ("connections", |c: &mut LoaderConfig| c.database.max_connections = 0),
            ("empty table", |c: &mut LoaderConfig| c.table.clear()),
            ("injected table", |c: &mut LoaderConfig| c.table = "rows; DROP TABLE x".into()),
            ("dangling dot", |c: &mut LoaderConfig| c.table = "staging.".into()),
            ("batch", |c: &mut LoaderConfig| c.batch_size = 0),
            ("extension", |c: &mut LoaderConfig| c.extension = ".".into()),
            ("delimiter", |c: &mut LoaderConfig| c.delimiter = ";;".into()),
            ("non-ascii delimiter", |c: &mut LoaderConfig| c.delimiter = "\u{a7}".into()),
            ("encoding", |c: &mut LoaderConfig| c.encoding = "klingon".into()),
            ("no columns", |c: &mut LoaderConfig| c.columns.clear()),
            ("duplicate column", |c: &mut LoaderConfig| {
                c.columns.push(ColumnSpec::new("column1", ColumnType::String))
            }),
            ("length on integer", |c: &mut LoaderConfig| c.columns[1].max_length = Some(4)),
        ];

        for (name, mutate) in cases {
            let mut config = minimal();
            mutate(&mut config);
            let err = config.validate().expect_err(name);
            assert!(matches!(err, RowloadError::Config(_)), "{name}: {err}");
        }
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("DATABASE_URL", "postgresql://env/db");
        std::env::set_var("ROWLOAD_TABLE", "env_rows");
        std::env::set_var("ROWLOAD_BATCH_SIZE", "42");
        std::env::set_var("ROWLOAD_SKIP_LOG", "/tmp/skips.log");

        let config = minimal().apply_env().unwrap();

        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("ROWLOAD_TABLE");
        std::env::remove_var("ROWLOAD_BATCH_SIZE");
        std::env::remove_var("ROWLOAD_SKIP_LOG");

        assert_eq!(config.database.url, "postgresql://env/db");
        assert_eq!(config.table, "env_rows");
        assert_eq!(config.batch_size, 42);
        assert_eq!(config.skip_log, PathBuf::from("/tmp/skips.log"));
    }

    #[test]
    #[serial]
    fn test_env_batch_size_must_be_numeric() {
        std::env::set_var("ROWLOAD_BATCH_SIZE", "lots");
        let result = minimal().apply_env();
        std::env::remove_var("ROWLOAD_BATCH_SIZE");

        assert!(matches!(result.unwrap_err(), RowloadError::Config(_)));
    }
}
