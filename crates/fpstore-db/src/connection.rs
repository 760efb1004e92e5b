//! PostgreSQL connection pool management

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use crate::config::PostgresqlConfig;
use crate::error::{DbError, Result};

pub type DbPool = Pool;

/// Create a PostgreSQL connection pool
///
/// `connection_string`, when present, takes precedence over the individual
/// host/port/user fields.
pub fn create_pool(config: &PostgresqlConfig) -> Result<DbPool> {
    let mut cfg = Config::new();
    if let Some(url) = &config.connection_string {
        cfg.url = Some(url.clone());
    } else {
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
    }

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_connections as usize));

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| DbError::InvalidConfig(e.to_string()))
}

/// Test database connection
pub async fn test_connection(pool: &DbPool) -> Result<()> {
    let client = pool.get().await?;
    let row = client.query_one("SELECT 1::INT4 AS test", &[]).await?;
    let test: i32 = row.get(0);

    if test == 1 {
        Ok(())
    } else {
        Err(DbError::StorageUnavailable(
            "database connection test failed".to_string(),
        ))
    }
}
