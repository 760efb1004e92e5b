//! Storage driver trait
//!
//! Drivers speak raw bytes and expose one primitive per statement. All
//! hex handling, chunking and fallback logic lives in `FingerprintDatabase`
//! so every backend honours the same contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FingerprintRow, NewFingerprint, SongId, SongRow};

#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Create missing tables and indexes
    async fn create_schema(&self) -> Result<()>;

    /// Drop both tables
    async fn drop_schema(&self) -> Result<()>;

    /// Drop and recreate both tables as one unit
    async fn reset_schema(&self) -> Result<()>;

    /// Insert a pending song and return its identifier
    async fn insert_song(&self, name: &str, file_sha1: &[u8]) -> Result<SongId>;

    async fn song_id_by_name(&self, name: &str) -> Result<Option<SongId>>;

    async fn song_by_id(&self, id: SongId) -> Result<Option<SongRow>>;

    async fn fingerprinted_songs(&self) -> Result<Vec<SongRow>>;

    async fn count_fingerprinted_songs(&self) -> Result<i64>;

    /// Set `fingerprinted`, returning the number of rows touched
    async fn set_fingerprinted(&self, id: SongId) -> Result<u64>;

    /// Delete one song (fingerprints cascade), returning rows removed
    async fn delete_song(&self, id: SongId) -> Result<u64>;

    /// Delete every pending song, returning rows removed
    async fn delete_unfingerprinted_songs(&self) -> Result<u64>;

    async fn insert_fingerprint(
        &self,
        song_id: SongId,
        fingerprint: &NewFingerprint,
    ) -> Result<()>;

    /// Write all rows inside a single transaction
    async fn insert_fingerprints(
        &self,
        song_id: SongId,
        fingerprints: &[NewFingerprint],
    ) -> Result<u64>;

    async fn fingerprints_by_hash(&self, hash: &[u8]) -> Result<Vec<FingerprintRow>>;

    /// One round trip returning every row whose hash is in `hashes`
    async fn fingerprints_in(&self, hashes: &[Vec<u8>]) -> Result<Vec<FingerprintRow>>;

    async fn all_fingerprints(&self) -> Result<Vec<FingerprintRow>>;

    async fn count_fingerprints(&self) -> Result<i64>;
}
