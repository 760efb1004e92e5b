//! Storage configuration
//!
//! TOML-based configuration for selecting the storage backend and tuning the
//! match engine and batch writer.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::postgres::DEFAULT_INSERT_BATCH_ROWS;

/// Keys per `hash IN (...)` lookup; stays under SQLite's historic
/// 999-parameter ceiling
pub const DEFAULT_CHUNK_SIZE: usize = 999;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub insert: InsertConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgresql: PostgresqlConfig,
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgresql,
    Sqlite,
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresqlConfig {
    /// Full `postgresql://` URL; wins over the individual fields
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "fpstore".to_string()
}
fn default_user() -> String {
    "fpstore".to_string()
}
fn default_max_connections() -> u32 {
    10
}

/// SQLite backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    #[serde(default = "default_sqlite_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> String {
    "./fingerprints.db".to_string()
}

/// Match engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Batch writer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InsertConfig {
    #[serde(default = "default_batch_rows")]
    pub batch_rows: usize,
}

impl Default for InsertConfig {
    fn default() -> Self {
        Self {
            batch_rows: default_batch_rows(),
        }
    }
}

fn default_batch_rows() -> usize {
    DEFAULT_INSERT_BATCH_ROWS
}

impl StoreConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: StoreConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.matching.chunk_size == 0 {
            anyhow::bail!("matching.chunk_size must be > 0");
        }
        if self.insert.batch_rows == 0 {
            anyhow::bail!("insert.batch_rows must be > 0");
        }
        if self.storage.backend == StorageBackend::Postgresql
            && self.storage.postgresql.max_connections == 0
        {
            anyhow::bail!("storage.postgresql.max_connections must be > 0");
        }
        Ok(())
    }

    /// Create a default SQLite configuration
    pub fn default_sqlite() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Sqlite,
                postgresql: PostgresqlConfig::default(),
                sqlite: SqliteConfig::default(),
            },
            matching: MatchingConfig::default(),
            insert: InsertConfig::default(),
        }
    }

    /// Create a default PostgreSQL configuration
    pub fn default_postgresql() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Postgresql,
                postgresql: PostgresqlConfig::default(),
                sqlite: SqliteConfig::default(),
            },
            matching: MatchingConfig::default(),
            insert: InsertConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_postgresql_config() {
        let config = StoreConfig::default_postgresql();
        assert_eq!(config.storage.backend, StorageBackend::Postgresql);
        assert_eq!(config.storage.postgresql.host, "localhost");
        assert_eq!(config.storage.postgresql.port, 5432);
        assert_eq!(config.matching.chunk_size, 999);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sqlite_toml() {
        let toml_str = r#"
            [storage]
            backend = "sqlite"

            [storage.sqlite]
            path = "/var/lib/fpstore/fp.db"

            [matching]
            chunk_size = 500
        "#;

        let config: StoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.sqlite.path, "/var/lib/fpstore/fp.db");
        assert_eq!(config.matching.chunk_size, 500);
        assert_eq!(config.insert.batch_rows, DEFAULT_INSERT_BATCH_ROWS);
    }

    #[test]
    fn test_parse_postgresql_toml() {
        let toml_str = r#"
            [storage]
            backend = "postgresql"

            [storage.postgresql]
            host = "db.example.com"
            port = 5433
            database = "fp_test"
            user = "fp_user"
            password = "fp_pass"
            max_connections = 20
        "#;

        let config: StoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Postgresql);
        assert_eq!(config.storage.postgresql.host, "db.example.com");
        assert_eq!(config.storage.postgresql.port, 5433);
        assert!(config.storage.postgresql.connection_string.is_none());
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let mut config = StoreConfig::default_sqlite();
        config.matching.chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
