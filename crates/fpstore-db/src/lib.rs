//! Fingerprint database layer
//!
//! Persists songs and their audio fingerprints and answers "which songs
//! contain these hashes, at what offset alignment" queries over PostgreSQL
//! or SQLite.

pub mod codec;
pub mod config;
pub mod connection;
pub mod database;
pub mod driver;
pub mod error;
pub mod maintenance;
pub mod matching;
pub mod models;
pub mod postgres;
pub mod registry;
pub mod schema;
pub mod sqlite;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{StorageBackend, StoreConfig};
pub use connection::{create_pool, test_connection, DbPool};
pub use database::FingerprintDatabase;
pub use driver::StorageDriver;
pub use error::{DbError, Result};
pub use matching::MatchPlan;
pub use models::{Fingerprint, OffsetMatch, Song, SongId};
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;
