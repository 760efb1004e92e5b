//! Shared fixtures for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::codec;
use crate::database::FingerprintDatabase;
use crate::driver::StorageDriver;
use crate::error::Result;
use crate::models::{FingerprintRow, NewFingerprint, SongId, SongRow};
use crate::sqlite::SqliteDriver;

pub const SHA1_A: &str = "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709";
pub const SHA1_B: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

/// Fresh in-memory database with the schema in place
pub async fn sqlite_database() -> FingerprintDatabase {
    let db = FingerprintDatabase::new(Arc::new(SqliteDriver::open_in_memory().unwrap()));
    db.create_all().await.unwrap();
    db
}

/// SQLite driver wrapper that counts calls and can play a competing writer
pub struct ProbeDriver {
    inner: SqliteDriver,
    chunk_lookups: AtomicUsize,
    song_inserts: AtomicUsize,
    racer: Mutex<Option<(String, String)>>,
}

impl ProbeDriver {
    pub async fn new() -> Self {
        let inner = SqliteDriver::open_in_memory().unwrap();
        inner.create_schema().await.unwrap();
        Self {
            inner,
            chunk_lookups: AtomicUsize::new(0),
            song_inserts: AtomicUsize::new(0),
            racer: Mutex::new(None),
        }
    }

    /// On the next name lookup for `name`, insert it first and report it
    /// missing, as if another writer won the race in between
    pub fn race_on_lookup(&self, name: &str, file_sha1: &str) {
        *self.racer.lock().unwrap() = Some((name.to_string(), file_sha1.to_string()));
    }

    pub fn chunk_lookups(&self) -> usize {
        self.chunk_lookups.load(Ordering::SeqCst)
    }

    pub fn song_inserts(&self) -> usize {
        self.song_inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageDriver for ProbeDriver {
    async fn create_schema(&self) -> Result<()> {
        self.inner.create_schema().await
    }

    async fn drop_schema(&self) -> Result<()> {
        self.inner.drop_schema().await
    }

    async fn reset_schema(&self) -> Result<()> {
        self.inner.reset_schema().await
    }

    async fn insert_song(&self, name: &str, file_sha1: &[u8]) -> Result<SongId> {
        self.song_inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_song(name, file_sha1).await
    }

    async fn song_id_by_name(&self, name: &str) -> Result<Option<SongId>> {
        let racer = {
            let mut racer = self.racer.lock().unwrap();
            let hit = matches!(racer.as_ref(), Some((racing, _)) if racing == name);
            if hit {
                racer.take()
            } else {
                None
            }
        };
        if let Some((racing, file_sha1)) = racer {
            let digest = codec::decode_file_sha1(&file_sha1)?;
            self.insert_song(&racing, &digest).await?;
            return Ok(None);
        }
        self.inner.song_id_by_name(name).await
    }

    async fn song_by_id(&self, id: SongId) -> Result<Option<SongRow>> {
        self.inner.song_by_id(id).await
    }

    async fn fingerprinted_songs(&self) -> Result<Vec<SongRow>> {
        self.inner.fingerprinted_songs().await
    }

    async fn count_fingerprinted_songs(&self) -> Result<i64> {
        self.inner.count_fingerprinted_songs().await
    }

    async fn set_fingerprinted(&self, id: SongId) -> Result<u64> {
        self.inner.set_fingerprinted(id).await
    }

    async fn delete_song(&self, id: SongId) -> Result<u64> {
        self.inner.delete_song(id).await
    }

    async fn delete_unfingerprinted_songs(&self) -> Result<u64> {
        self.inner.delete_unfingerprinted_songs().await
    }

    async fn insert_fingerprint(
        &self,
        song_id: SongId,
        fingerprint: &NewFingerprint,
    ) -> Result<()> {
        self.inner.insert_fingerprint(song_id, fingerprint).await
    }

    async fn insert_fingerprints(
        &self,
        song_id: SongId,
        fingerprints: &[NewFingerprint],
    ) -> Result<u64> {
        self.inner.insert_fingerprints(song_id, fingerprints).await
    }

    async fn fingerprints_by_hash(&self, hash: &[u8]) -> Result<Vec<FingerprintRow>> {
        self.inner.fingerprints_by_hash(hash).await
    }

    async fn fingerprints_in(&self, hashes: &[Vec<u8>]) -> Result<Vec<FingerprintRow>> {
        self.chunk_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.fingerprints_in(hashes).await
    }

    async fn all_fingerprints(&self) -> Result<Vec<FingerprintRow>> {
        self.inner.all_fingerprints().await
    }

    async fn count_fingerprints(&self) -> Result<i64> {
        self.inner.count_fingerprints().await
    }
}
