use serde::{Deserialize, Serialize};

use crate::codec;

/// Surrogate identifier of a song row
pub type SongId = i64;

/// A fingerprinted audio work as presented to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub name: String,
    pub fingerprinted: bool,
    /// Uppercase hex of the 20-byte content digest
    pub file_sha1: String,
}

/// A stored fingerprint as presented to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Uppercase hex of the raw hash
    pub hash: String,
    pub song_id: SongId,
    pub offset: i64,
}

/// One hit produced by the match engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OffsetMatch {
    pub song_id: SongId,
    /// Stored offset minus query offset
    pub offset_delta: i64,
}

/// Song row exactly as a driver reads it
#[derive(Debug, Clone)]
pub struct SongRow {
    pub id: SongId,
    pub name: String,
    pub fingerprinted: bool,
    pub file_sha1: Vec<u8>,
}

/// Fingerprint row exactly as a driver reads it
#[derive(Debug, Clone)]
pub struct FingerprintRow {
    pub hash: Vec<u8>,
    pub song_id: SongId,
    pub offset: i64,
}

/// Input structure for writing a fingerprint
#[derive(Debug, Clone)]
pub struct NewFingerprint {
    pub hash: Vec<u8>,
    pub offset: i64,
}

impl From<SongRow> for Song {
    fn from(row: SongRow) -> Self {
        Song {
            id: row.id,
            name: row.name,
            fingerprinted: row.fingerprinted,
            file_sha1: codec::encode_hex(&row.file_sha1),
        }
    }
}

impl From<FingerprintRow> for Fingerprint {
    fn from(row: FingerprintRow) -> Self {
        Fingerprint {
            hash: codec::encode_hex(&row.hash),
            song_id: row.song_id,
            offset: row.offset,
        }
    }
}
