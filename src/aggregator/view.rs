use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::models::{Follow, Playlist, PlaylistEntry, Song, User};
use crate::catalog::query::contains_ignore_case;

pub const UNKNOWN_OWNER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSong {
    pub position: i64,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistView {
    pub id: String,
    pub name: String,
    pub owner_name: String,
    /// ISO date (`YYYY-MM-DD`).
    pub created_date: Option<String>,
    pub follower_count: usize,
    pub songs: Vec<ViewSong>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaylistSort {
    /// Order in which playlists appear in the input.
    #[default]
    Input,
    Name,
    Created,
}

/// Joins playlists with their owner, songs and follower count.
///
/// Every playlist matching `name_filter` appears, including those without
/// entries. Entries pointing at unknown songs are dropped from the song list.
pub fn build_playlist_view(
    playlists: &[Playlist],
    users: &[User],
    entries: &[PlaylistEntry],
    songs: &[Song],
    follows: &[Follow],
    name_filter: Option<&str>,
) -> Vec<PlaylistView> {
    let users_by_id: HashMap<&str, &User> = users.iter().map(|u| (u.id.as_str(), u)).collect();
    let songs_by_id: HashMap<&str, &Song> = songs.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut entries_by_playlist: HashMap<&str, Vec<&PlaylistEntry>> = HashMap::new();
    for entry in entries {
        entries_by_playlist
            .entry(entry.playlist_id.as_str())
            .or_default()
            .push(entry);
    }

    let mut followers_by_playlist: HashMap<&str, usize> = HashMap::new();
    for follow in follows {
        *followers_by_playlist
            .entry(follow.playlist_id.as_str())
            .or_default() += 1;
    }

    playlists
        .iter()
        .filter(|p| contains_ignore_case(&p.name, name_filter))
        .map(|playlist| {
            let owner_name = playlist
                .owner_id
                .as_deref()
                .and_then(|id| users_by_id.get(id))
                .map(|u| u.name.clone())
                .unwrap_or_else(|| UNKNOWN_OWNER.to_string());

            let mut view_songs: Vec<ViewSong> = entries_by_playlist
                .get(playlist.id.as_str())
                .into_iter()
                .flatten()
                .filter_map(|entry| {
                    songs_by_id.get(entry.song_id.as_str()).map(|song| ViewSong {
                        position: entry.position,
                        title: song.title.clone(),
                        artist: song.artist.clone(),
                    })
                })
                .collect();
            view_songs.sort_by_key(|s| s.position);

            PlaylistView {
                id: playlist.id.clone(),
                name: playlist.name.clone(),
                owner_name,
                created_date: playlist
                    .created_date
                    .map(|d| d.format("%Y-%m-%d").to_string()),
                follower_count: followers_by_playlist
                    .get(playlist.id.as_str())
                    .copied()
                    .unwrap_or(0),
                songs: view_songs,
            }
        })
        .collect()
}

/// Stable sort, so ties keep their input order.
pub fn sort_views(views: &mut [PlaylistView], sort: PlaylistSort) {
    match sort {
        PlaylistSort::Input => {}
        PlaylistSort::Name => views.sort_by(|a, b| a.name.cmp(&b.name)),
        PlaylistSort::Created => views.sort_by(|a, b| a.created_date.cmp(&b.created_date)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRef {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailSong {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub position: i64,
}

/// A single playlist with owner and followers resolved to names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistDetail {
    pub id: String,
    pub name: String,
    pub created_date: Option<String>,
    pub owner: UserRef,
    pub followers: Vec<UserRef>,
    pub songs: Vec<DetailSong>,
}

/// Followers and songs that do not resolve are left out.
pub fn build_playlist_detail(
    playlist: &Playlist,
    users: &[User],
    entries: &[PlaylistEntry],
    songs: &[Song],
    follows: &[Follow],
) -> PlaylistDetail {
    let users_by_id: HashMap<&str, &User> = users.iter().map(|u| (u.id.as_str(), u)).collect();
    let songs_by_id: HashMap<&str, &Song> = songs.iter().map(|s| (s.id.as_str(), s)).collect();

    let owner = UserRef {
        id: playlist.owner_id.clone(),
        name: playlist
            .owner_id
            .as_deref()
            .and_then(|id| users_by_id.get(id))
            .map(|u| u.name.clone())
            .unwrap_or_else(|| UNKNOWN_OWNER.to_string()),
    };

    let followers = follows
        .iter()
        .filter(|f| f.playlist_id == playlist.id)
        .filter_map(|f| users_by_id.get(f.user_id.as_str()))
        .map(|u| UserRef {
            id: Some(u.id.clone()),
            name: u.name.clone(),
        })
        .collect();

    let mut detail_songs: Vec<DetailSong> = entries
        .iter()
        .filter(|e| e.playlist_id == playlist.id)
        .filter_map(|e| {
            songs_by_id.get(e.song_id.as_str()).map(|s| DetailSong {
                song_id: s.id.clone(),
                title: s.title.clone(),
                artist: s.artist.clone(),
                position: e.position,
            })
        })
        .collect();
    detail_songs.sort_by_key(|s| s.position);

    PlaylistDetail {
        id: playlist.id.clone(),
        name: playlist.name.clone(),
        created_date: playlist
            .created_date
            .map(|d| d.format("%Y-%m-%d").to_string()),
        owner,
        followers,
        songs: detail_songs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn users() -> Vec<User> {
        vec![
            User {
                id: "u1".into(),
                name: "Ada".into(),
            },
            User {
                id: "u2".into(),
                name: "Grace".into(),
            },
        ]
    }

    fn songs() -> Vec<Song> {
        vec![
            Song::mock("s1", "Respect", "Aretha"),
            Song::mock("s2", "Think", "Aretha"),
            Song::mock("s3", "Chain of Fools", "Aretha"),
        ]
    }

    #[test]
    fn test_roadtrip_songs_sorted_by_position() {
        let playlists = vec![Playlist::mock("p1", "Roadtrip", "u1")];
        let entries = vec![
            PlaylistEntry::mock("p1", "s1", 1),
            PlaylistEntry::mock("p1", "s2", 3),
            PlaylistEntry::mock("p1", "s3", 2),
        ];

        let views = build_playlist_view(&playlists, &users(), &entries, &songs(), &[], None);

        assert_eq!(views.len(), 1);
        let titles: Vec<_> = views[0].songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Respect", "Chain of Fools", "Think"]);
        assert_eq!(views[0].owner_name, "Ada");
        assert_eq!(views[0].created_date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_name_filter_is_case_insensitive_substring() {
        let playlists = vec![
            Playlist::mock("p1", "Summer Roadtrip", "u1"),
            Playlist::mock("p2", "Focus", "u2"),
        ];

        let views = build_playlist_view(&playlists, &users(), &[], &songs(), &[], Some("ROAD"));

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "Summer Roadtrip");
    }

    #[test]
    fn test_empty_playlist_is_included() {
        let playlists = vec![Playlist::mock("p1", "Empty", "u1")];
        let views = build_playlist_view(&playlists, &users(), &[], &songs(), &[], None);
        assert_eq!(views.len(), 1);
        assert!(views[0].songs.is_empty());
    }

    #[test]
    fn test_missing_owner_reads_unknown() {
        let playlists = vec![Playlist::mock("p1", "Lost", "u404")];
        let views = build_playlist_view(&playlists, &users(), &[], &songs(), &[], None);
        assert_eq!(views[0].owner_name, UNKNOWN_OWNER);
    }

    #[test]
    fn test_follower_count_and_input_order() {
        let playlists = vec![
            Playlist::mock("p2", "Zeta", "u1"),
            Playlist::mock("p1", "Alpha", "u1"),
        ];
        let follows = vec![
            Follow {
                playlist_id: "p1".into(),
                user_id: "u1".into(),
            },
            Follow {
                playlist_id: "p1".into(),
                user_id: "u2".into(),
            },
            Follow {
                playlist_id: "p2".into(),
                user_id: "u2".into(),
            },
        ];

        let mut views = build_playlist_view(&playlists, &users(), &[], &songs(), &follows, None);
        assert_eq!(views[0].name, "Zeta");
        assert_eq!(views[0].follower_count, 1);
        assert_eq!(views[1].follower_count, 2);

        sort_views(&mut views, PlaylistSort::Name);
        assert_eq!(views[0].name, "Alpha");
    }

    #[test]
    fn test_created_sort_puts_undated_first_and_keeps_ties_in_input_order() {
        let dated = |id: &str, name: &str, ymd: Option<(i32, u32, u32)>| Playlist {
            created_date: ymd.and_then(|(y, m, d)| {
                chrono::NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(9, 0, 0))
            }),
            ..Playlist::mock(id, name, "u1")
        };
        let playlists = vec![
            dated("p1", "Late A", Some((2024, 5, 1))),
            dated("p2", "Undated", None),
            dated("p3", "Early", Some((2023, 1, 1))),
            dated("p4", "Late B", Some((2024, 5, 1))),
        ];

        let mut views = build_playlist_view(&playlists, &users(), &[], &songs(), &[], None);
        sort_views(&mut views, PlaylistSort::Created);

        let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Undated", "Early", "Late A", "Late B"]);
        assert_eq!(views[0].created_date, None);
    }

    #[test]
    fn test_detail_resolves_owner_and_followers() {
        let playlist = Playlist::mock("p1", "Roadtrip", "u1");
        let entries = vec![
            PlaylistEntry::mock("p1", "s2", 2),
            PlaylistEntry::mock("p1", "missing", 3),
            PlaylistEntry::mock("p1", "s1", 1),
        ];
        let follows = vec![
            Follow {
                playlist_id: "p1".into(),
                user_id: "u2".into(),
            },
            Follow {
                playlist_id: "p1".into(),
                user_id: "ghost".into(),
            },
        ];

        let detail = build_playlist_detail(&playlist, &users(), &entries, &songs(), &follows);

        assert_eq!(detail.owner.name, "Ada");
        assert_eq!(detail.followers.len(), 1);
        assert_eq!(detail.followers[0].name, "Grace");
        let ids: Vec<_> = detail.songs.iter().map(|s| s.song_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    proptest! {
        #[test]
        fn prop_songs_are_non_decreasing_by_position(
            positions in proptest::collection::vec(-50i64..50, 0..40)
        ) {
            let playlists = vec![Playlist::mock("p1", "Any", "u1")];
            let songs: Vec<Song> = (0..positions.len())
                .map(|i| Song::mock(&format!("s{i}"), &format!("T{i}"), "A"))
                .collect();
            let entries: Vec<PlaylistEntry> = positions
                .iter()
                .enumerate()
                .map(|(i, p)| PlaylistEntry::mock("p1", &format!("s{i}"), *p))
                .collect();

            let views = build_playlist_view(&playlists, &[], &entries, &songs, &[], None);

            prop_assert_eq!(views[0].songs.len(), positions.len());
            prop_assert!(views[0].songs.windows(2).all(|w| w[0].position <= w[1].position));
        }
    }
}
