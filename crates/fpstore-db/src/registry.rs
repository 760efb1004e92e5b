//! Song registry: idempotent registration and the fingerprinted transition

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::codec;
use crate::database::FingerprintDatabase;
use crate::error::{DbError, Result};
use crate::models::{Song, SongId};

impl FingerprintDatabase {
    /// Register a song, returning the existing identifier if the name is taken
    ///
    /// Concurrent registrations of one name are arbitrated by the unique
    /// constraint on `song_name`: the losing insert falls back to a lookup.
    pub async fn register_song(&self, name: &str, file_sha1: &str) -> Result<SongId> {
        let digest = codec::decode_file_sha1(file_sha1)?;

        if let Some(id) = self.driver.song_id_by_name(name).await? {
            log::debug!("Song {:?} already registered as {}", name, id);
            return Ok(id);
        }

        match self.driver.insert_song(name, &digest).await {
            Ok(id) => {
                log::debug!("Registered song {:?} as {}", name, id);
                Ok(id)
            }
            Err(err) if err.is_constraint_violation() => {
                match self.driver.song_id_by_name(name).await? {
                    Some(id) => {
                        log::warn!(
                            "Song {:?} was registered concurrently, reusing id {}",
                            name,
                            id
                        );
                        Ok(id)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Flag a song as having all of its fingerprints written
    ///
    /// Fails with `NotFound` when the identifier does not exist.
    pub async fn mark_fingerprinted(&self, song_id: SongId) -> Result<()> {
        match self.driver.set_fingerprinted(song_id).await? {
            0 => Err(DbError::NotFound(format!("song {}", song_id))),
            _ => Ok(()),
        }
    }

    pub async fn song_by_id(&self, song_id: SongId) -> Result<Option<Song>> {
        Ok(self.driver.song_by_id(song_id).await?.map(Song::from))
    }

    /// Every fully fingerprinted song
    ///
    /// Nothing is read until the stream is first polled; each call scans
    /// again. Ordering is whatever the backend returns.
    pub fn fingerprinted_songs(&self) -> BoxStream<'static, Result<Song>> {
        let driver = self.driver.clone();
        stream::once(async move { driver.fingerprinted_songs().await })
            .map_ok(|rows| {
                stream::iter(rows.into_iter().map(|row| Ok::<_, DbError>(Song::from(row))))
            })
            .try_flatten()
            .boxed()
    }

    pub async fn count_fingerprinted_songs(&self) -> Result<i64> {
        self.driver.count_fingerprinted_songs().await
    }

    /// Delete a song and, by cascade, its fingerprints
    ///
    /// Returns `false` if no such song existed.
    pub async fn delete_song(&self, song_id: SongId) -> Result<bool> {
        let deleted = self.driver.delete_song(song_id).await?;
        if deleted > 0 {
            log::info!("Deleted song {}", song_id);
        }
        Ok(deleted > 0)
    }
}
