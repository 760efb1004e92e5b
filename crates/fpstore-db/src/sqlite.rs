//! Embedded SQLite driver
//!
//! A single connection guarded by a mutex. Each call locks, runs its
//! statements synchronously and releases the lock before returning.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::driver::StorageDriver;
use crate::error::{DbError, Result};
use crate::models::{FingerprintRow, NewFingerprint, SongId, SongRow};
use crate::schema::{self, Dialect};

pub struct SqliteDriver {
    conn: Mutex<Connection>,
}

impl SqliteDriver {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::StorageUnavailable(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Adopt an already-opened connection
    pub fn from_connection(conn: Connection) -> Result<Self> {
        // Cascades are only enforced with foreign keys switched on
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DbError::StorageUnavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn song_from_row(r: &Row) -> rusqlite::Result<SongRow> {
    Ok(SongRow {
        id: r.get(0)?,
        name: r.get(1)?,
        fingerprinted: r.get(2)?,
        file_sha1: r.get(3)?,
    })
}

fn fingerprint_from_row(r: &Row) -> rusqlite::Result<FingerprintRow> {
    Ok(FingerprintRow {
        hash: r.get(0)?,
        song_id: r.get(1)?,
        offset: r.get(2)?,
    })
}

#[async_trait]
impl StorageDriver for SqliteDriver {
    async fn create_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(Dialect::Sqlite.create_sql())?;
        Ok(())
    }

    async fn drop_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(Dialect::Sqlite.drop_sql())?;
        Ok(())
    }

    async fn reset_schema(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute_batch(Dialect::Sqlite.drop_sql())?;
        tx.execute_batch(Dialect::Sqlite.create_sql())?;
        tx.commit()?;
        Ok(())
    }

    async fn insert_song(&self, name: &str, file_sha1: &[u8]) -> Result<SongId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO songs (song_name, file_sha1) VALUES (?1, ?2)",
            params![name, file_sha1],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn song_id_by_name(&self, name: &str) -> Result<Option<SongId>> {
        let id = self
            .lock()?
            .query_row(
                "SELECT song_id FROM songs WHERE song_name = ?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    }

    async fn song_by_id(&self, id: SongId) -> Result<Option<SongRow>> {
        let song = self
            .lock()?
            .query_row(
                "SELECT song_id, song_name, fingerprinted, file_sha1
                 FROM songs
                 WHERE song_id = ?1",
                params![id],
                song_from_row,
            )
            .optional()?;
        Ok(song)
    }

    async fn fingerprinted_songs(&self) -> Result<Vec<SongRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT song_id, song_name, fingerprinted, file_sha1
             FROM songs
             WHERE fingerprinted = 1",
        )?;
        let songs = stmt
            .query_map([], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    async fn count_fingerprinted_songs(&self) -> Result<i64> {
        let count = self.lock()?.query_row(
            "SELECT COUNT(*) FROM songs WHERE fingerprinted = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    async fn set_fingerprinted(&self, id: SongId) -> Result<u64> {
        let updated = self.lock()?.execute(
            "UPDATE songs SET fingerprinted = 1 WHERE song_id = ?1",
            params![id],
        )?;
        Ok(updated as u64)
    }

    async fn delete_song(&self, id: SongId) -> Result<u64> {
        let deleted = self
            .lock()?
            .execute("DELETE FROM songs WHERE song_id = ?1", params![id])?;
        Ok(deleted as u64)
    }

    async fn delete_unfingerprinted_songs(&self) -> Result<u64> {
        let deleted = self
            .lock()?
            .execute("DELETE FROM songs WHERE fingerprinted = 0", [])?;
        Ok(deleted as u64)
    }

    async fn insert_fingerprint(
        &self,
        song_id: SongId,
        fingerprint: &NewFingerprint,
    ) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO fingerprints (hash, song_id, song_offset) VALUES (?1, ?2, ?3)",
            params![fingerprint.hash, song_id, fingerprint.offset],
        )?;
        Ok(())
    }

    async fn insert_fingerprints(
        &self,
        song_id: SongId,
        fingerprints: &[NewFingerprint],
    ) -> Result<u64> {
        if fingerprints.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fingerprints (hash, song_id, song_offset) VALUES (?1, ?2, ?3)",
            )?;
            for fp in fingerprints {
                written += stmt.execute(params![fp.hash, song_id, fp.offset])? as u64;
            }
        }
        // An early return above drops `tx`, which rolls back
        tx.commit()?;
        Ok(written)
    }

    async fn fingerprints_by_hash(&self, hash: &[u8]) -> Result<Vec<FingerprintRow>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT hash, song_id, song_offset FROM fingerprints WHERE hash = ?1")?;
        let rows = stmt
            .query_map(params![hash], fingerprint_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn fingerprints_in(&self, hashes: &[Vec<u8>]) -> Result<Vec<FingerprintRow>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT hash, song_id, song_offset FROM fingerprints WHERE {}",
            schema::in_clause(Dialect::Sqlite, hashes.len())
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(hashes.iter()), fingerprint_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn all_fingerprints(&self) -> Result<Vec<FingerprintRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT hash, song_id, song_offset FROM fingerprints")?;
        let rows = stmt
            .query_map([], fingerprint_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn count_fingerprints(&self) -> Result<i64> {
        let count = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM fingerprints", [], |r| r.get(0))?;
        Ok(count)
    }
}
