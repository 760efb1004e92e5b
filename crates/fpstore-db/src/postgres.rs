//! PostgreSQL driver
//!
//! Every call checks out its own pooled client; the client goes back to the
//! pool when it is dropped, on success and error paths alike.

use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::connection::{self, DbPool};
use crate::driver::StorageDriver;
use crate::error::Result;
use crate::models::{FingerprintRow, NewFingerprint, SongId, SongRow};
use crate::schema::{self, Dialect};

/// Rows per `INSERT ... SELECT FROM jsonb_array_elements` statement
pub const DEFAULT_INSERT_BATCH_ROWS: usize = 1000;

pub struct PostgresDriver {
    pool: DbPool,
    batch_rows: usize,
}

impl PostgresDriver {
    /// Wrap an existing pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            batch_rows: DEFAULT_INSERT_BATCH_ROWS,
        }
    }

    /// Build a pool from configuration and check that the server answers
    pub async fn connect(config: &crate::config::PostgresqlConfig) -> Result<Self> {
        let pool = connection::create_pool(config)?;
        connection::test_connection(&pool).await?;
        log::info!(
            "Connected to PostgreSQL (max {} connections)",
            config.max_connections
        );
        Ok(Self::new(pool))
    }

    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.max(1);
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn song_from_row(r: &Row) -> SongRow {
    SongRow {
        id: r.get(0),
        name: r.get(1),
        fingerprinted: r.get(2),
        file_sha1: r.get(3),
    }
}

fn fingerprint_from_row(r: &Row) -> FingerprintRow {
    FingerprintRow {
        hash: r.get(0),
        song_id: r.get(1),
        offset: r.get(2),
    }
}

#[async_trait]
impl StorageDriver for PostgresDriver {
    async fn create_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(Dialect::Postgres.create_sql()).await?;
        Ok(())
    }

    async fn drop_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(Dialect::Postgres.drop_sql()).await?;
        Ok(())
    }

    async fn reset_schema(&self) -> Result<()> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.batch_execute(Dialect::Postgres.drop_sql()).await?;
        tx.batch_execute(Dialect::Postgres.create_sql()).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_song(&self, name: &str, file_sha1: &[u8]) -> Result<SongId> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                "INSERT INTO songs (song_name, file_sha1)
                 VALUES ($1, $2)
                 RETURNING song_id",
                &[&name, &file_sha1],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn song_id_by_name(&self, name: &str) -> Result<Option<SongId>> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt("SELECT song_id FROM songs WHERE song_name = $1", &[&name])
            .await?;

        Ok(row.map(|r| r.get(0)))
    }

    async fn song_by_id(&self, id: SongId) -> Result<Option<SongRow>> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT song_id, song_name, fingerprinted, file_sha1
                 FROM songs
                 WHERE song_id = $1",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(song_from_row))
    }

    async fn fingerprinted_songs(&self) -> Result<Vec<SongRow>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT song_id, song_name, fingerprinted, file_sha1
                 FROM songs
                 WHERE fingerprinted",
                &[],
            )
            .await?;

        Ok(rows.iter().map(song_from_row).collect())
    }

    async fn count_fingerprinted_songs(&self) -> Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM songs WHERE fingerprinted", &[])
            .await?;
        Ok(row.get(0))
    }

    async fn set_fingerprinted(&self, id: SongId) -> Result<u64> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE songs SET fingerprinted = TRUE WHERE song_id = $1",
                &[&id],
            )
            .await?;
        Ok(updated)
    }

    async fn delete_song(&self, id: SongId) -> Result<u64> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM songs WHERE song_id = $1", &[&id])
            .await?;
        Ok(deleted)
    }

    async fn delete_unfingerprinted_songs(&self) -> Result<u64> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM songs WHERE NOT fingerprinted", &[])
            .await?;
        Ok(deleted)
    }

    async fn insert_fingerprint(
        &self,
        song_id: SongId,
        fingerprint: &NewFingerprint,
    ) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO fingerprints (hash, song_id, song_offset) VALUES ($1, $2, $3)",
                &[&fingerprint.hash, &song_id, &fingerprint.offset],
            )
            .await?;
        Ok(())
    }

    /// Batch insert fingerprints using JSONB, one transaction for the whole call
    async fn insert_fingerprints(
        &self,
        song_id: SongId,
        fingerprints: &[NewFingerprint],
    ) -> Result<u64> {
        if fingerprints.is_empty() {
            return Ok(0);
        }

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let mut written = 0;
        for batch in fingerprints.chunks(self.batch_rows) {
            let json_array = serde_json::Value::Array(
                batch
                    .iter()
                    .map(|fp| {
                        serde_json::json!({
                            "hash": hex::encode(&fp.hash),
                            "offset": fp.offset,
                        })
                    })
                    .collect(),
            );

            written += tx
                .execute(
                    "INSERT INTO fingerprints (hash, song_id, song_offset)
                     SELECT
                         decode(fp->>'hash', 'hex'),
                         $1,
                         (fp->>'offset')::BIGINT
                     FROM jsonb_array_elements($2::jsonb) AS fp",
                    &[&song_id, &json_array],
                )
                .await?;
            log::debug!("Wrote {} fingerprints for song {}", written, song_id);
        }

        // Dropping `tx` without commit rolls everything back
        tx.commit().await?;
        Ok(written)
    }

    async fn fingerprints_by_hash(&self, hash: &[u8]) -> Result<Vec<FingerprintRow>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT hash, song_id, song_offset FROM fingerprints WHERE hash = $1",
                &[&hash],
            )
            .await?;

        Ok(rows.iter().map(fingerprint_from_row).collect())
    }

    async fn fingerprints_in(&self, hashes: &[Vec<u8>]) -> Result<Vec<FingerprintRow>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.pool.get().await?;

        let sql = format!(
            "SELECT hash, song_id, song_offset FROM fingerprints WHERE {}",
            schema::in_clause(Dialect::Postgres, hashes.len())
        );
        let params: Vec<&(dyn ToSql + Sync)> = hashes
            .iter()
            .map(|h| h as &(dyn ToSql + Sync))
            .collect();

        let rows = client.query(sql.as_str(), &params[..]).await?;

        Ok(rows.iter().map(fingerprint_from_row).collect())
    }

    async fn all_fingerprints(&self) -> Result<Vec<FingerprintRow>> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT hash, song_id, song_offset FROM fingerprints", &[])
            .await?;
        Ok(rows.iter().map(fingerprint_from_row).collect())
    }

    async fn count_fingerprints(&self) -> Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM fingerprints", &[])
            .await?;
        Ok(row.get(0))
    }
}

#[cfg(test)]
mod tests {
    // These tests require a running PostgreSQL instance configured with the
    // default credentials and are run with:
    // cargo test --package fpstore-db -- --ignored
    use super::*;
    use crate::config::PostgresqlConfig;
    use crate::FingerprintDatabase;
    use futures::TryStreamExt;
    use std::sync::Arc;

    const SHA1: &str = "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709";

    async fn fresh_database() -> FingerprintDatabase {
        let driver = PostgresDriver::connect(&PostgresqlConfig::default())
            .await
            .unwrap();
        let db = FingerprintDatabase::new(Arc::new(driver));
        db.reset_all().await.unwrap();
        db
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_register_insert_and_match() {
        let db = fresh_database().await;

        let id = db.register_song("pg song", SHA1).await.unwrap();
        assert_eq!(db.register_song("pg song", SHA1).await.unwrap(), id);

        db.insert_fingerprints(id, vec![("A1B2", 100u32), ("C3D4", 200)])
            .await
            .unwrap();
        db.mark_fingerprinted(id).await.unwrap();

        let matches: Vec<_> = db
            .match_offsets(vec![("a1b2", 40u32)])
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].offset_delta, 60);
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_duplicate_fingerprint_is_constraint_violation() {
        let db = fresh_database().await;
        let id = db.register_song("dup", SHA1).await.unwrap();

        db.insert_fingerprint("A1B2", id, 1).await.unwrap();
        let err = db.insert_fingerprint("A1B2", id, 1).await.unwrap_err();
        assert!(err.is_constraint_violation());
        // The server's message survives, constraint name included
        assert!(err.to_string().contains("fingerprints_unique"), "got {err}");
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_missing_table_error_names_the_table() {
        let db = fresh_database().await;
        db.drop_all().await.unwrap();

        let err = db.count_fingerprints().await.unwrap_err();
        assert!(matches!(err, crate::DbError::Storage(_)), "got {err:?}");
        assert!(err.to_string().contains("fingerprints"), "got {err}");

        db.create_all().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_failure_in_later_slice_rolls_back_whole_batch() {
        let driver = PostgresDriver::connect(&PostgresqlConfig::default())
            .await
            .unwrap()
            .with_batch_rows(2);
        let db = FingerprintDatabase::new(Arc::new(driver));
        db.reset_all().await.unwrap();
        let id = db.register_song("sliced", SHA1).await.unwrap();

        // Slices: [01, 02], [03, 04], [05, 01]; the last repeats the first row
        let batch = vec![
            ("01", 1u32),
            ("02", 2),
            ("03", 3),
            ("04", 4),
            ("05", 5),
            ("01", 1),
        ];
        let err = db.insert_fingerprints(id, batch.clone()).await.unwrap_err();
        assert!(err.is_constraint_violation(), "got {err:?}");
        assert_eq!(db.count_fingerprints().await.unwrap(), 0);

        // Three full slices go through once the duplicate is gone
        let written = db.insert_fingerprints(id, batch[..5].to_vec()).await.unwrap();
        assert_eq!(written, 5);
    }
}
