//! Fingerprint store: single and batched writes, point lookups, counts

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::codec;
use crate::database::FingerprintDatabase;
use crate::error::{DbError, Result};
use crate::models::{Fingerprint, NewFingerprint, SongId};

impl FingerprintDatabase {
    /// Insert one fingerprint
    ///
    /// A repeated (hash, song, offset) triple fails with `ConstraintViolation`.
    pub async fn insert_fingerprint(&self, hash: &str, song_id: SongId, offset: u32) -> Result<()> {
        let fingerprint = NewFingerprint {
            hash: codec::decode_hash(hash)?,
            offset: i64::from(offset),
        };
        self.driver.insert_fingerprint(song_id, &fingerprint).await
    }

    /// Insert every `(hash, offset)` pair for one song, all or nothing
    ///
    /// Hashes are validated before anything is sent; returns the number of
    /// rows written.
    pub async fn insert_fingerprints<I, S>(&self, song_id: SongId, pairs: I) -> Result<u64>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let fingerprints = pairs
            .into_iter()
            .map(|(hash, offset)| {
                Ok(NewFingerprint {
                    hash: codec::decode_hash(hash.as_ref())?,
                    offset: i64::from(offset),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if fingerprints.is_empty() {
            return Ok(0);
        }

        let written = self.driver.insert_fingerprints(song_id, &fingerprints).await?;
        log::debug!("Inserted {} fingerprints for song {}", written, song_id);
        Ok(written)
    }

    /// All `(song_id, offset)` occurrences of one hash
    pub async fn query_hash(&self, hash: &str) -> Result<Vec<(SongId, i64)>> {
        let hash = codec::decode_hash(hash)?;
        let rows = self.driver.fingerprints_by_hash(&hash).await?;
        Ok(rows.into_iter().map(|r| (r.song_id, r.offset)).collect())
    }

    /// Every stored fingerprint; each call scans again
    pub fn all_fingerprints(&self) -> BoxStream<'static, Result<Fingerprint>> {
        let driver = self.driver.clone();
        stream::once(async move { driver.all_fingerprints().await })
            .map_ok(|rows| {
                stream::iter(
                    rows.into_iter()
                        .map(|row| Ok::<_, DbError>(Fingerprint::from(row))),
                )
            })
            .try_flatten()
            .boxed()
    }

    pub async fn count_fingerprints(&self) -> Result<i64> {
        self.driver.count_fingerprints().await
    }
}
