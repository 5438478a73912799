use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::catalog::models::{PlaylistEntry, Song};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistStats {
    pub artist: String,
    /// Number of playlist entries, not deduplicated by song.
    pub playlist_membership_count: usize,
    pub average_position: f64,
    pub unique_song_count: usize,
}

/// Result of a statistics run. An empty catalog is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "statistics", rename_all = "snake_case")]
pub enum Statistics {
    Found(Vec<ArtistStats>),
    Empty,
}

impl Statistics {
    pub fn from_vec(stats: Vec<ArtistStats>) -> Self {
        if stats.is_empty() {
            Statistics::Empty
        } else {
            Statistics::Found(stats)
        }
    }
}

#[derive(Default)]
struct ArtistAccumulator<'a> {
    entries: usize,
    position_sum: i128,
    songs: HashSet<&'a str>,
}

/// Groups entries by the artist of their song, sorted by artist name.
///
/// Entries whose song is unknown do not contribute.
pub fn build_statistics(entries: &[PlaylistEntry], songs: &[Song]) -> Vec<ArtistStats> {
    let artist_by_song: HashMap<&str, &str> = songs
        .iter()
        .map(|s| (s.id.as_str(), s.artist.as_str()))
        .collect();

    let mut by_artist: BTreeMap<&str, ArtistAccumulator<'_>> = BTreeMap::new();
    for entry in entries {
        let Some(&artist) = artist_by_song.get(entry.song_id.as_str()) else {
            continue;
        };
        let acc = by_artist.entry(artist).or_default();
        acc.entries += 1;
        acc.position_sum += i128::from(entry.position);
        acc.songs.insert(entry.song_id.as_str());
    }

    by_artist
        .into_iter()
        .map(|(artist, acc)| ArtistStats {
            artist: artist.to_string(),
            playlist_membership_count: acc.entries,
            average_position: acc.position_sum as f64 / acc.entries as f64,
            unique_song_count: acc.songs.len(),
        })
        .collect()
}
