//! JSON files produced by the external fingerprint extractor

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One `(hash, offset)` pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashOffset {
    pub hash: String,
    pub offset: u32,
}

/// A fingerprinted song ready to import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongImport {
    pub name: String,
    pub file_sha1: String,
    pub fingerprints: Vec<HashOffset>,
}

impl SongImport {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse song import {}", path.display()))
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, u32)> {
        self.fingerprints.iter().map(|fp| (fp.hash.as_str(), fp.offset))
    }
}

/// Load the hashes extracted from an unknown clip
pub fn load_query(path: &Path) -> Result<Vec<HashOffset>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse query {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_song_import() {
        let json = r#"{
            "name": "Track 01",
            "file_sha1": "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709",
            "fingerprints": [
                { "hash": "a1b2c3d4e5f60718", "offset": 0 },
                { "hash": "0102030405060708", "offset": 12 }
            ]
        }"#;

        let import: SongImport = serde_json::from_str(json).unwrap();
        let pairs: Vec<_> = import.pairs().collect();
        assert_eq!(pairs, vec![("a1b2c3d4e5f60718", 0), ("0102030405060708", 12)]);
    }

    #[test]
    fn test_negative_offset_is_rejected() {
        let json = r#"[{ "hash": "AA", "offset": -1 }]"#;
        assert!(serde_json::from_str::<Vec<HashOffset>>(json).is_err());
    }
}
