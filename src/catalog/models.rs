use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Unresolved owners are kept; resolution happens at read time.
    pub owner_id: Option<String>,
    pub created_date: Option<NaiveDateTime>,
}

/// Association between a playlist and a song, ordered by `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub playlist_id: String,
    pub song_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    pub playlist_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
}

impl NewSong {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.artist.trim().is_empty() {
            return Err(AppError::InvalidInput("title and artist are required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl SongUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.title.is_none() && self.artist.is_none() {
            return Err(AppError::InvalidInput("title or artist is required".into()));
        }
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.title) || blank(&self.artist) {
            return Err(AppError::InvalidInput("title and artist must not be empty".into()));
        }
        Ok(())
    }

    pub fn apply(&self, song: &mut Song) {
        if let Some(title) = &self.title {
            song.title = title.clone();
        }
        if let Some(artist) = &self.artist {
            song.artist = artist.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlaylistSong {
    pub song_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
    pub owner_id: String,
    /// Defaults to the time of creation.
    pub created_date: Option<NaiveDateTime>,
    pub songs: Vec<NewPlaylistSong>,
}

impl NewPlaylist {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.owner_id.trim().is_empty() {
            return Err(AppError::InvalidInput("name, owner_id and songs are required".into()));
        }
        if self.songs.iter().any(|s| s.song_id.trim().is_empty()) {
            return Err(AppError::InvalidInput(
                "each song must have a song_id and a position".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Song {
    pub fn mock(id: &str, title: &str, artist: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
        }
    }
}

#[cfg(test)]
impl Playlist {
    pub fn mock(id: &str, name: &str, owner_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            owner_id: Some(owner_id.to_string()),
            created_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0)),
        }
    }
}

#[cfg(test)]
impl PlaylistEntry {
    pub fn mock(playlist_id: &str, song_id: &str, position: i64) -> Self {
        Self {
            playlist_id: playlist_id.to_string(),
            song_id: song_id.to_string(),
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_song_requires_title_and_artist() {
        let song = NewSong {
            title: "  ".to_string(),
            artist: "Aretha Franklin".to_string(),
        };
        assert!(matches!(song.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_song_update_requires_a_field() {
        assert!(SongUpdate::default().validate().is_err());

        let update = SongUpdate {
            title: Some("Respect".to_string()),
            artist: None,
        };
        assert!(update.validate().is_ok());

        let mut song = Song::mock("1", "Old", "Aretha");
        update.apply(&mut song);
        assert_eq!(song.title, "Respect");
        assert_eq!(song.artist, "Aretha");
    }

    #[test]
    fn test_new_playlist_rejects_blank_song_id() {
        let playlist = NewPlaylist {
            name: "Roadtrip".to_string(),
            owner_id: "1".to_string(),
            created_date: None,
            songs: vec![NewPlaylistSong {
                song_id: String::new(),
                position: 1,
            }],
        };
        assert!(playlist.validate().is_err());
    }
}
