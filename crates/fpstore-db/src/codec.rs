//! Hex boundary between callers and the raw binary columns
//!
//! Hashes and content digests are stored as raw bytes. Callers only ever see
//! uppercase hexadecimal strings; input is accepted in either case.

use crate::error::{DbError, Result};

/// Widest fingerprint hash the schema accepts, in bytes
pub const MAX_HASH_BYTES: usize = 10;

/// Width of a song content digest (SHA-1), in bytes
pub const FILE_SHA1_BYTES: usize = 20;

/// Encode raw bytes as an uppercase hex string
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Uppercase a fingerprint hash after checking that it decodes
pub fn normalize_hash(hash: &str) -> Result<String> {
    decode_hash(hash)?;
    Ok(hash.to_ascii_uppercase())
}

/// Decode a fingerprint hash (1 to `MAX_HASH_BYTES` bytes)
pub fn decode_hash(hash: &str) -> Result<Vec<u8>> {
    let bytes = decode(hash)?;
    if bytes.is_empty() || bytes.len() > MAX_HASH_BYTES {
        return Err(DbError::InvalidHex {
            value: hash.to_string(),
            reason: format!(
                "fingerprint hash must be 1 to {} bytes, got {}",
                MAX_HASH_BYTES,
                bytes.len()
            ),
        });
    }
    Ok(bytes)
}

/// Decode a song content digest (exactly `FILE_SHA1_BYTES` bytes)
pub fn decode_file_sha1(digest: &str) -> Result<Vec<u8>> {
    let bytes = decode(digest)?;
    if bytes.len() != FILE_SHA1_BYTES {
        return Err(DbError::InvalidHex {
            value: digest.to_string(),
            reason: format!(
                "content hash must be {} bytes, got {}",
                FILE_SHA1_BYTES,
                bytes.len()
            ),
        });
    }
    Ok(bytes)
}

fn decode(value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| DbError::InvalidHex {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
