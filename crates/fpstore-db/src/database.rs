//! Owned handle over a storage driver

use std::path::Path;
use std::sync::Arc;

use crate::config::{StorageBackend, StoreConfig, DEFAULT_CHUNK_SIZE};
use crate::driver::StorageDriver;
use crate::error::{DbError, Result};
use crate::postgres::PostgresDriver;
use crate::sqlite::SqliteDriver;

/// Fingerprint database: song registry, fingerprint store, match engine and
/// maintenance operations over one storage driver
#[derive(Clone)]
pub struct FingerprintDatabase {
    pub(crate) driver: Arc<dyn StorageDriver>,
    pub(crate) chunk_size: usize,
}

impl FingerprintDatabase {
    pub fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self {
            driver,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Number of hashes sent per batched lookup
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DbError::InvalidConfig("chunk size must be > 0".to_string()));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }

    /// Build the configured driver
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DbError::InvalidConfig(e.to_string()))?;

        let driver: Arc<dyn StorageDriver> = match config.storage.backend {
            StorageBackend::Postgresql => Arc::new(
                PostgresDriver::connect(&config.storage.postgresql)
                    .await?
                    .with_batch_rows(config.insert.batch_rows),
            ),
            StorageBackend::Sqlite => {
                let path = Path::new(&config.storage.sqlite.path);
                log::info!("Opening SQLite database at {}", path.display());
                Arc::new(SqliteDriver::open(path)?)
            }
        };

        Self::new(driver).with_chunk_size(config.matching.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_sqlite_from_config() {
        let mut config = StoreConfig::default_sqlite();
        config.storage.sqlite.path = ":memory:".to_string();
        config.matching.chunk_size = 10;

        let db = FingerprintDatabase::open(&config).await.unwrap();
        assert_eq!(db.chunk_size(), 10);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let db = FingerprintDatabase::new(Arc::new(SqliteDriver::open_in_memory().unwrap()));
        assert!(matches!(db.with_chunk_size(0), Err(DbError::InvalidConfig(_))));
    }
}
