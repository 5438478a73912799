use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::models::{Follow, Playlist, PlaylistEntry};
use crate::migrator::rows::{EntryRow, FollowRow, PlaylistRow};

/// Song reference stored inline in a playlist document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedSong {
    pub song_id: String,
    pub position: i64,
}

/// Playlist document carrying its songs and followers inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedPlaylist {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
    #[serde(default, deserialize_with = "crate::migrator::rows::lenient_datetime")]
    pub created_date: Option<NaiveDateTime>,
    pub songs: Vec<EmbeddedSong>,
    pub followers: Vec<String>,
}

impl EmbeddedPlaylist {
    pub fn playlist(&self) -> Playlist {
        Playlist {
            id: self.id.clone(),
            name: self.name.clone(),
            owner_id: self.owner_id.clone(),
            created_date: self.created_date,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = PlaylistEntry> + '_ {
        self.songs.iter().map(|s| PlaylistEntry {
            playlist_id: self.id.clone(),
            song_id: s.song_id.clone(),
            position: s.position,
        })
    }

    pub fn follows(&self) -> impl Iterator<Item = Follow> + '_ {
        self.followers.iter().map(|user_id| Follow {
            playlist_id: self.id.clone(),
            user_id: user_id.clone(),
        })
    }
}

/// A source row left out of the migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub collection: String,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbedOutcome {
    pub playlists: Vec<EmbeddedPlaylist>,
    pub skipped: Vec<SkippedRecord>,
}

fn skip(skipped: &mut Vec<SkippedRecord>, collection: &str, index: usize, reason: String) {
    warn!("Skipping {} record #{}: {}", collection, index, reason);
    skipped.push(SkippedRecord {
        collection: collection.to_string(),
        index,
        reason,
    });
}

/// Folds normalized playlist, entry and follow rows into playlist documents.
///
/// Songs keep their source position verbatim and follower ids are not
/// deduplicated. Output order follows the input order of every collection, so
/// the same snapshot always yields the same documents. Rows missing a
/// required field are skipped individually.
pub fn embed_playlists(
    playlists: &[PlaylistRow],
    entries: &[EntryRow],
    follows: &[FollowRow],
) -> EmbedOutcome {
    let mut skipped = Vec::new();

    let mut songs_by_playlist: HashMap<String, Vec<EmbeddedSong>> = HashMap::new();
    for (index, row) in entries.iter().enumerate() {
        match PlaylistEntry::try_from(row.clone()) {
            Ok(entry) => songs_by_playlist
                .entry(entry.playlist_id)
                .or_default()
                .push(EmbeddedSong {
                    song_id: entry.song_id,
                    position: entry.position,
                }),
            Err(e) => skip(&mut skipped, "playlist_song", index, e.to_string()),
        }
    }

    let mut followers_by_playlist: HashMap<String, Vec<String>> = HashMap::new();
    for (index, row) in follows.iter().enumerate() {
        match Follow::try_from(row.clone()) {
            Ok(follow) => followers_by_playlist
                .entry(follow.playlist_id)
                .or_default()
                .push(follow.user_id),
            Err(e) => skip(&mut skipped, "playlist_follower", index, e.to_string()),
        }
    }

    let mut documents = Vec::with_capacity(playlists.len());
    for (index, row) in playlists.iter().enumerate() {
        let playlist = match Playlist::try_from(row.clone()) {
            Ok(p) => p,
            Err(e) => {
                skip(&mut skipped, "playlist", index, e.to_string());
                continue;
            }
        };

        documents.push(EmbeddedPlaylist {
            songs: songs_by_playlist
                .get(&playlist.id)
                .cloned()
                .unwrap_or_default(),
            followers: followers_by_playlist
                .get(&playlist.id)
                .cloned()
                .unwrap_or_default(),
            id: playlist.id,
            name: playlist.name,
            owner_id: playlist.owner_id,
            created_date: playlist.created_date,
        });
    }

    EmbedOutcome {
        playlists: documents,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_row(id: &str, name: &str, owner: Option<&str>) -> PlaylistRow {
        PlaylistRow {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            owner_id: owner.map(str::to_string),
            created_date: None,
        }
    }

    fn entry_row(playlist: &str, song: &str, position: i64) -> EntryRow {
        EntryRow {
            playlist_id: Some(playlist.to_string()),
            song_id: Some(song.to_string()),
            position: Some(position),
        }
    }

    fn follow_row(playlist: &str, user: &str) -> FollowRow {
        FollowRow {
            playlist_id: Some(playlist.to_string()),
            follower_id: Some(user.to_string()),
        }
    }

    #[test]
    fn test_embeds_songs_and_followers() {
        let outcome = embed_playlists(
            &[playlist_row("1", "Roadtrip", Some("10"))],
            &[entry_row("1", "100", 1), entry_row("1", "101", 3)],
            &[follow_row("1", "11"), follow_row("1", "12")],
        );

        assert!(outcome.skipped.is_empty());
        let doc = &outcome.playlists[0];
        assert_eq!(doc.id, "1");
        assert_eq!(doc.owner_id.as_deref(), Some("10"));
        assert_eq!(
            doc.songs,
            vec![
                EmbeddedSong {
                    song_id: "100".into(),
                    position: 1,
                },
                EmbeddedSong {
                    song_id: "101".into(),
                    position: 3,
                },
            ]
        );
        assert_eq!(doc.followers, vec!["11", "12"]);
    }

    #[test]
    fn test_playlist_without_follows_has_empty_followers_field() {
        let outcome = embed_playlists(&[playlist_row("1", "Quiet", Some("10"))], &[], &[]);

        let json = serde_json::to_value(&outcome.playlists[0]).unwrap();
        assert_eq!(json["followers"], serde_json::json!([]));
        assert_eq!(json["songs"], serde_json::json!([]));
    }

    #[test]
    fn test_positions_and_duplicates_pass_through() {
        let outcome = embed_playlists(
            &[playlist_row("1", "Dupes", Some("10"))],
            &[entry_row("1", "100", 5), entry_row("1", "101", 5)],
            &[follow_row("1", "11"), follow_row("1", "11")],
        );

        let doc = &outcome.playlists[0];
        assert_eq!(doc.songs[0].position, 5);
        assert_eq!(doc.songs[1].position, 5);
        assert_eq!(doc.followers, vec!["11", "11"]);
    }

    #[test]
    fn test_unresolved_owner_is_still_migrated() {
        let outcome = embed_playlists(&[playlist_row("1", "Orphan", None)], &[], &[]);
        assert_eq!(outcome.playlists.len(), 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_malformed_rows_are_skipped_individually() {
        let outcome = embed_playlists(
            &[
                PlaylistRow {
                    id: Some("2".into()),
                    ..PlaylistRow::default()
                },
                playlist_row("1", "Good", Some("10")),
            ],
            &[
                EntryRow {
                    playlist_id: Some("1".into()),
                    song_id: None,
                    position: Some(1),
                },
                entry_row("1", "100", 2),
            ],
            &[FollowRow::default()],
        );

        assert_eq!(outcome.playlists.len(), 1);
        assert_eq!(outcome.playlists[0].songs.len(), 1);
        assert_eq!(outcome.skipped.len(), 3);

        let collections: Vec<_> = outcome.skipped.iter().map(|s| s.collection.as_str()).collect();
        assert!(collections.contains(&"playlist"));
        assert!(collections.contains(&"playlist_song"));
        assert!(collections.contains(&"playlist_follower"));
    }

    #[test]
    fn test_rerun_yields_identical_bytes() {
        let playlists = vec![
            playlist_row("1", "A", Some("10")),
            playlist_row("2", "B", Some("11")),
        ];
        let entries = vec![
            entry_row("2", "100", 2),
            entry_row("1", "101", 1),
            entry_row("2", "102", 1),
        ];
        let follows = vec![follow_row("2", "10"), follow_row("1", "11")];

        let first = serde_json::to_vec(&embed_playlists(&playlists, &entries, &follows)).unwrap();
        let second = serde_json::to_vec(&embed_playlists(&playlists, &entries, &follows)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_derived_entries_and_follows() {
        let outcome = embed_playlists(
            &[playlist_row("1", "A", Some("10"))],
            &[entry_row("1", "100", 4)],
            &[follow_row("1", "12")],
        );
        let doc = &outcome.playlists[0];

        let entries: Vec<_> = doc.entries().collect();
        assert_eq!(entries, vec![PlaylistEntry::mock("1", "100", 4)]);

        let follows: Vec<_> = doc.follows().collect();
        assert_eq!(follows[0].user_id, "12");
        assert_eq!(doc.playlist().name, "A");
    }
}
