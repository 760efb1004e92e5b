//! Match query engine
//!
//! Turns the `(hash, offset)` pairs of an unknown clip into
//! `(song_id, stored_offset - query_offset)` hits. Distinct hashes are sent
//! to the backend in chunks so no single `IN (...)` list exceeds the
//! configured size.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::codec;
use crate::database::FingerprintDatabase;
use crate::driver::StorageDriver;
use crate::error::{DbError, Result};
use crate::models::OffsetMatch;


/// Lookup plan for one query clip
#[derive(Debug)]
pub struct MatchPlan {
    /// Uppercase hex hash -> query offset
    offsets: HashMap<String, u32>,
    /// Distinct raw hashes, split into lookup-sized groups
    chunks: Vec<Vec<Vec<u8>>>,
}

impl MatchPlan {
    /// Build a plan from query pairs
    ///
    /// When a hash repeats, the later offset replaces the earlier one.
    pub fn build<I, S>(pairs: I, chunk_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut offsets = HashMap::new();
        for (hash, offset) in pairs {
            offsets.insert(codec::normalize_hash(hash.as_ref())?, offset);
        }

        let keys = offsets
            .keys()
            .map(|hash| codec::decode_hash(hash))
            .collect::<Result<Vec<_>>>()?;
        let chunks = keys
            .chunks(chunk_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();

        Ok(Self { offsets, chunks })
    }

    /// Number of distinct hashes
    pub fn distinct_hashes(&self) -> usize {
        self.offsets.len()
    }

    /// Storage round trips the plan will make
    pub fn round_trips(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[Vec<Vec<u8>>] {
        &self.chunks
    }

    /// Run the plan, one lookup per chunk, lazily as the stream is polled
    pub fn execute(
        self,
        driver: Arc<dyn StorageDriver>,
    ) -> BoxStream<'static, Result<OffsetMatch>> {
        let offsets = Arc::new(self.offsets);
        let total = self.chunks.len();

        stream::iter(self.chunks.into_iter().enumerate())
            .then(move |(index, chunk)| {
                let driver = driver.clone();
                async move {
                    let rows = driver.fingerprints_in(&chunk).await?;
                    log::debug!(
                        "Chunk {}/{}: {} hashes, {} rows",
                        index + 1,
                        total,
                        chunk.len(),
                        rows.len()
                    );
                    Ok::<_, DbError>(rows)
                }
            })
            .map_ok(move |rows| {
                let offsets = offsets.clone();
                stream::iter(rows.into_iter().filter_map(move |row| {
                    // Backends hand back raw bytes; re-key by uppercase hex
                    let key = codec::encode_hex(&row.hash);
                    offsets.get(&key).map(|&query_offset| {
                        Ok::<_, DbError>(OffsetMatch {
                            song_id: row.song_id,
                            offset_delta: row.offset - i64::from(query_offset),
                        })
                    })
                }))
            })
            .try_flatten()
            .boxed()
    }
}

impl FingerprintDatabase {
    /// Find every stored occurrence of the query hashes
    ///
    /// Yields one `OffsetMatch` per stored row, in no particular order and
    /// without deduplication. An empty query never touches storage.
    pub fn match_offsets<I, S>(&self, pairs: I) -> Result<BoxStream<'static, Result<OffsetMatch>>>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let plan = MatchPlan::build(pairs, self.chunk_size)?;
        log::debug!(
            "Matching {} distinct hashes in {} lookups",
            plan.distinct_hashes(),
            plan.round_trips()
        );
        Ok(plan.execute(self.driver.clone()))
    }

    /// Collect `match_offsets` into a vector
    pub async fn collect_matches<I, S>(&self, pairs: I) -> Result<Vec<OffsetMatch>>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        self.match_offsets(pairs)?.try_collect().await
    }
}
