use crate::grammar::Dialect;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

/// Database-related configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    /// SQL dialect of the grammar; `common` when absent
    pub driver: Option<Dialect>,
    /// `sqlite::memory:`, `sqlite:<path>` or a bare file path
    pub dsn: String,
    /// Prefix applied to every logical table name
    pub prefix: Option<String>,
    pub sqlite: Option<SqliteOptions>,
}

/// SQLite connection options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqliteOptions {
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
    pub busy_timeout_ms: Option<u64>,
}

fn default_foreign_keys() -> bool {
    true
}

impl Default for SqliteOptions {
    fn default() -> Self {
        SqliteOptions {
            foreign_keys: default_foreign_keys(),
            busy_timeout_ms: None,
        }
    }
}

/// Failure to load a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl DatabaseConfig {
    /// A private in-memory SQLite database without a table prefix
    pub fn memory() -> Self {
        DatabaseConfig {
            driver: Some(Dialect::Sqlite),
            dsn: "sqlite::memory:".to_string(),
            prefix: None,
            sqlite: None,
        }
    }

    /// Parses a bare `[database]`-style table, without the section header
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.unwrap_or_default()
    }

    pub fn table_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = minidb::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config.database.dialect());
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// `<config dir>/minidb/config.toml`, where the CLI looks when no `--config` is given.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("minidb").join("config.toml"))
}
