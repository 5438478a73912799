//! Document backend: one JSON array file per collection.
//!
//! Playlists are stored embedded, carrying `songs[]` and `followers[]`
//! inline. Entries and follows are derived from those arrays on read.
//! The flat `playlist`, `playlist_song` and `playlist_follower` collections
//! hold a normalized dump and only serve as a migration source.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::explain::QueryObserver;
use crate::catalog::models::{
    Follow, NewPlaylist, NewSong, Playlist, PlaylistEntry, Song, SongUpdate, User,
};
use crate::catalog::query::{contains_ignore_case, SongFilter};
use crate::catalog::{CatalogSource, CatalogWriter, DocumentSink, MigrationSource};
use crate::error::{AppError, Result};
use crate::migrator::embed::{EmbeddedPlaylist, EmbeddedSong};
use crate::migrator::rows::{EntryRow, FollowRow, PlaylistRow};

pub const SONGS: &str = "songs";
pub const USERS: &str = "users";
pub const FLAT_PLAYLISTS: &str = "playlist";
pub const FLAT_ENTRIES: &str = "playlist_song";
pub const FLAT_FOLLOWERS: &str = "playlist_follower";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub artist: String,
}

impl From<SongDocument> for Song {
    fn from(doc: SongDocument) -> Self {
        Song {
            id: doc.id,
            title: doc.title,
            artist: doc.artist,
        }
    }
}

impl From<&Song> for SongDocument {
    fn from(song: &Song) -> Self {
        SongDocument {
            id: song.id.clone(),
            title: song.title.clone(),
            artist: song.artist.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id,
            name: doc.name,
        }
    }
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: user.id.clone(),
            name: user.name.clone(),
        }
    }
}

fn check_collection_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(AppError::InvalidInput(format!(
            "invalid collection name: {:?}",
            name
        )));
    }
    Ok(())
}

pub struct DocumentCatalog {
    dir: PathBuf,
    playlists: String,
    lock: Arc<RwLock<()>>,
    observer: Option<Arc<dyn QueryObserver>>,
}

impl DocumentCatalog {
    /// `playlists` names the collection holding embedded playlist documents.
    pub fn new(dir: PathBuf, playlists: impl Into<String>) -> Result<Self> {
        let playlists = playlists.into();
        check_collection_name(&playlists)?;

        Ok(Self {
            dir,
            playlists,
            lock: Arc::new(RwLock::new(())),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn explain(&self, label: &str, collection: &str) {
        if let Some(observer) = &self.observer {
            let statement = format!("find {}", collection);
            observer.observe(label, &statement, &[format!("COLLSCAN {}", collection)]);
        }
    }

    async fn read_raw(&self, name: &str) -> Result<Vec<Value>> {
        let path = self.collection_path(name);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Documents that fail to decode are skipped with a warning.
    async fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let raw = self.read_raw(name).await?;
        let mut docs = Vec::with_capacity(raw.len());

        for (index, value) in raw.into_iter().enumerate() {
            match serde_json::from_value(value) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!("Skipping document #{} in {}: {}", index, name, e),
            }
        }

        Ok(docs)
    }

    /// Writes to a temporary file and renames it over the collection.
    async fn write_raw(&self, name: &str, docs: &[Value]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.collection_path(name);
        let tmp = self.dir.join(format!(".{}.json.tmp", name));
        let json = serde_json::to_string_pretty(docs)?;

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Wrote {} documents to {}", docs.len(), path.display());
        Ok(())
    }

    async fn append<T: Serialize>(&self, name: &str, doc: &T) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        let mut docs = self.read_raw(name).await?;
        docs.push(value);
        self.write_raw(name, &docs).await
    }

    async fn store<T: Serialize>(&self, name: &str, docs: &[T]) -> Result<()> {
        let values = docs
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.write_raw(name, &values).await
    }

    async fn embedded(&self, label: &str) -> Result<Vec<EmbeddedPlaylist>> {
        self.explain(label, &self.playlists);
        self.load(&self.playlists).await
    }
}

impl CatalogSource for DocumentCatalog {
    async fn fetch_songs(&self, filter: &SongFilter) -> Result<Vec<Song>> {
        let _guard = self.lock.read().await;
        self.explain("songs", SONGS);

        let docs: Vec<SongDocument> = self.load(SONGS).await?;
        Ok(docs
            .into_iter()
            .map(Song::from)
            .filter(|s| filter.matches(s))
            .collect())
    }

    async fn fetch_playlists(&self, name_filter: Option<&str>) -> Result<Vec<Playlist>> {
        let _guard = self.lock.read().await;
        let docs = self.embedded("playlists").await?;

        Ok(docs
            .iter()
            .filter(|d| contains_ignore_case(&d.name, name_filter))
            .map(EmbeddedPlaylist::playlist)
            .collect())
    }

    async fn fetch_entries(&self, playlist_id: Option<&str>) -> Result<Vec<PlaylistEntry>> {
        let _guard = self.lock.read().await;
        let docs = self.embedded("playlist entries").await?;

        Ok(docs
            .iter()
            .filter(|d| playlist_id.is_none_or(|id| d.id == id))
            .flat_map(|d| d.entries().collect::<Vec<_>>())
            .collect())
    }

    async fn fetch_follows(&self, playlist_id: Option<&str>) -> Result<Vec<Follow>> {
        let _guard = self.lock.read().await;
        let docs = self.embedded("playlist followers").await?;

        Ok(docs
            .iter()
            .filter(|d| playlist_id.is_none_or(|id| d.id == id))
            .flat_map(|d| d.follows().collect::<Vec<_>>())
            .collect())
    }

    async fn fetch_user(&self, id: &str) -> Result<Option<User>> {
        let _guard = self.lock.read().await;
        let docs: Vec<UserDocument> = self.load(USERS).await?;
        Ok(docs.into_iter().find(|u| u.id == id).map(User::from))
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let _guard = self.lock.read().await;
        let docs: Vec<UserDocument> = self.load(USERS).await?;
        Ok(docs.into_iter().map(User::from).collect())
    }
}

impl MigrationSource for DocumentCatalog {
    async fn fetch_playlist_rows(&self) -> Result<Vec<PlaylistRow>> {
        let _guard = self.lock.read().await;
        self.explain("playlist rows", FLAT_PLAYLISTS);
        self.load(FLAT_PLAYLISTS).await
    }

    async fn fetch_entry_rows(&self) -> Result<Vec<EntryRow>> {
        let _guard = self.lock.read().await;
        self.explain("playlist_song rows", FLAT_ENTRIES);
        self.load(FLAT_ENTRIES).await
    }

    async fn fetch_follow_rows(&self) -> Result<Vec<FollowRow>> {
        let _guard = self.lock.read().await;
        self.explain("playlist_follower rows", FLAT_FOLLOWERS);
        self.load(FLAT_FOLLOWERS).await
    }
}

impl CatalogWriter for DocumentCatalog {
    async fn add_song(&self, song: NewSong) -> Result<String> {
        song.validate()?;
        let _guard = self.lock.write().await;

        let mut docs: Vec<SongDocument> = self.load(SONGS).await?;
        let id = Uuid::new_v4().to_string();
        docs.push(SongDocument {
            id: id.clone(),
            title: song.title,
            artist: song.artist,
        });
        self.store(SONGS, &docs).await?;

        Ok(id)
    }

    async fn update_song(&self, id: &str, update: SongUpdate) -> Result<Song> {
        update.validate()?;
        let _guard = self.lock.write().await;

        let mut docs: Vec<SongDocument> = self.load(SONGS).await?;
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::NotFound(format!("song {}", id)))?;

        let mut song = Song::from(doc.clone());
        update.apply(&mut song);
        *doc = SongDocument::from(&song);

        self.store(SONGS, &docs).await?;
        Ok(song)
    }

    async fn delete_song(&self, id: &str) -> Result<()> {
        let _guard = self.lock.write().await;

        let mut docs: Vec<SongDocument> = self.load(SONGS).await?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(AppError::NotFound(format!("song {}", id)));
        }

        let mut playlists: Vec<EmbeddedPlaylist> = self.load(&self.playlists).await?;
        for playlist in &mut playlists {
            playlist.songs.retain(|s| s.song_id != id);
        }

        self.store(&self.playlists, &playlists).await?;
        self.store(SONGS, &docs).await
    }

    async fn add_user(&self, name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("name is required".into()));
        }
        let _guard = self.lock.write().await;

        let mut docs: Vec<UserDocument> = self.load(USERS).await?;
        let id = Uuid::new_v4().to_string();
        docs.push(UserDocument {
            id: id.clone(),
            name: name.to_string(),
        });
        self.store(USERS, &docs).await?;

        Ok(id)
    }

    async fn create_playlist(&self, playlist: NewPlaylist) -> Result<String> {
        playlist.validate()?;
        let _guard = self.lock.write().await;

        let users: Vec<UserDocument> = self.load(USERS).await?;
        if !users.iter().any(|u| u.id == playlist.owner_id) {
            return Err(AppError::NotFound(format!("owner {}", playlist.owner_id)));
        }

        let songs: Vec<SongDocument> = self.load(SONGS).await?;
        let mut embedded_songs: Vec<EmbeddedSong> = Vec::with_capacity(playlist.songs.len());
        for song in &playlist.songs {
            if !songs.iter().any(|s| s.id == song.song_id) {
                return Err(AppError::NotFound(format!("song {}", song.song_id)));
            }
            if embedded_songs.iter().any(|s| s.song_id == song.song_id) {
                return Err(AppError::Conflict(format!("song {} listed twice", song.song_id)));
            }
            embedded_songs.push(EmbeddedSong {
                song_id: song.song_id.clone(),
                position: song.position,
            });
        }

        let id = Uuid::new_v4().to_string();
        let doc = EmbeddedPlaylist {
            id: id.clone(),
            name: playlist.name.clone(),
            owner_id: Some(playlist.owner_id),
            created_date: Some(
                playlist
                    .created_date
                    .unwrap_or_else(|| chrono::Local::now().naive_local()),
            ),
            songs: embedded_songs,
            followers: Vec::new(),
        };
        self.append(&self.playlists, &doc).await?;

        info!("Created playlist {} ({})", id, playlist.name);
        Ok(id)
    }

    async fn follow_playlist(&self, playlist_id: &str, user_id: &str) -> Result<()> {
        let _guard = self.lock.write().await;

        let users: Vec<UserDocument> = self.load(USERS).await?;
        if !users.iter().any(|u| u.id == user_id) {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        let mut docs: Vec<EmbeddedPlaylist> = self.load(&self.playlists).await?;
        let playlist = docs
            .iter_mut()
            .find(|d| d.id == playlist_id)
            .ok_or_else(|| AppError::NotFound(format!("playlist {}", playlist_id)))?;

        if playlist.followers.iter().any(|f| f == user_id) {
            return Err(AppError::Conflict(format!(
                "user {} already follows playlist {}",
                user_id, playlist_id
            )));
        }
        playlist.followers.push(user_id.to_string());

        self.store(&self.playlists, &docs).await
    }

    async fn delete_playlist(&self, id: &str) -> Result<()> {
        let _guard = self.lock.write().await;

        let mut docs: Vec<EmbeddedPlaylist> = self.load(&self.playlists).await?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(AppError::NotFound(format!("playlist {}", id)));
        }

        self.store(&self.playlists, &docs).await
    }
}

impl DocumentSink for DocumentCatalog {
    async fn replace_collection<T: Serialize + Sync>(&self, name: &str, docs: &[T]) -> Result<()> {
        check_collection_name(name)?;
        let values = docs
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let _guard = self.lock.write().await;
        self.write_raw(name, &values).await?;

        info!("Replaced collection {} with {} documents", name, values.len());
        Ok(())
    }

    async fn insert_embedded_playlist(
        &self,
        collection: &str,
        doc: &EmbeddedPlaylist,
    ) -> Result<()> {
        check_collection_name(collection)?;

        let _guard = self.lock.write().await;
        self.append(collection, doc).await?;

        debug!("Inserted playlist {} into {}", doc.id, collection);
        Ok(())
    }
}
