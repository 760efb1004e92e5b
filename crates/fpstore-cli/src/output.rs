//! JSON output formatting

use fpstore_db::{OffsetMatch, SongId};
use serde::Serialize;
use std::collections::HashMap;

/// Hits sharing one `(song, delta)` alignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignmentCount {
    pub song_id: SongId,
    pub offset_delta: i64,
    pub hits: usize,
}

/// Group hits by alignment and keep the `top` largest groups
pub fn tally(matches: &[OffsetMatch], top: usize) -> Vec<AlignmentCount> {
    let mut counts: HashMap<OffsetMatch, usize> = HashMap::new();
    for m in matches {
        *counts.entry(*m).or_default() += 1;
    }

    let mut ranked: Vec<AlignmentCount> = counts
        .into_iter()
        .map(|(m, hits)| AlignmentCount {
            song_id: m.song_id,
            offset_delta: m.offset_delta,
            hits,
        })
        .collect();
    // Ties broken deterministically for stable output
    ranked.sort_by(|a, b| {
        b.hits
            .cmp(&a.hits)
            .then(a.song_id.cmp(&b.song_id))
            .then(a.offset_delta.cmp(&b.offset_delta))
    });
    ranked.truncate(top);
    ranked
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
