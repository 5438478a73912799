use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::catalog::explain::QueryObserver;
use crate::catalog::models::{
    Follow, NewPlaylist, NewSong, Playlist, PlaylistEntry, Song, SongUpdate, User,
};
use crate::catalog::query::{contains_ignore_case, SongFilter};
use crate::catalog::{CatalogSource, CatalogWriter, MigrationSource};
use crate::error::{AppError, Result};
use crate::migrator::rows::{parse_datetime, EntryRow, FollowRow, PlaylistRow};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "user" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS song (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    artist TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS playlist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    owner_id INTEGER REFERENCES "user"(id),
    created_date TEXT
);

CREATE TABLE IF NOT EXISTS playlist_song (
    playlist_id INTEGER NOT NULL REFERENCES playlist(id) ON DELETE CASCADE,
    song_id INTEGER NOT NULL REFERENCES song(id) ON DELETE CASCADE,
    position INTEGER,
    PRIMARY KEY (playlist_id, song_id)
);

CREATE TABLE IF NOT EXISTS playlist_follower (
    playlist_id INTEGER NOT NULL REFERENCES playlist(id) ON DELETE CASCADE,
    follower_id INTEGER NOT NULL REFERENCES "user"(id) ON DELETE CASCADE,
    PRIMARY KEY (playlist_id, follower_id)
);

CREATE INDEX IF NOT EXISTS idx_song_artist ON song(artist);
CREATE INDEX IF NOT EXISTS idx_playlist_song_song ON playlist_song(song_id);
"#;

const SELECT_SONGS: &str = r#"
SELECT id, title, artist FROM song
ORDER BY id
"#;

const SELECT_PLAYLISTS: &str = r#"
SELECT id, name, owner_id, created_date FROM playlist
ORDER BY id
"#;

const SELECT_ENTRIES: &str = r#"
SELECT playlist_id, song_id, position FROM playlist_song
WHERE (?1 IS NULL OR playlist_id = ?1)
ORDER BY rowid
"#;

const SELECT_FOLLOWS: &str = r#"
SELECT playlist_id, follower_id FROM playlist_follower
WHERE (?1 IS NULL OR playlist_id = ?1)
ORDER BY rowid
"#;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a catalog id. `None` means the id cannot name a row in this store.
fn row_id(id: &str) -> Option<i64> {
    id.trim().parse().ok()
}

/// Writes reject ids that are not integers; reads treat them as absent.
fn required_id(id: &str, what: &str) -> Result<i64> {
    row_id(id).ok_or_else(|| {
        AppError::InvalidInput(format!("{} id must be an integer: {}", what, id))
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Relational catalog store.
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
    observer: Option<Arc<dyn QueryObserver>>,
}

impl SqliteCatalog {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Opened relational catalog at {}", path.display());
        Self::from_pool(pool).await
    }

    /// In-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self {
            pool,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Parameters are bound as NULL; the plan does not depend on their values.
    async fn explain(&self, label: &str, statement: &str, params: usize) -> Result<()> {
        let Some(observer) = &self.observer else {
            return Ok(());
        };

        let sql = format!("EXPLAIN QUERY PLAN {}", statement);
        let mut query = sqlx::query(&sql);
        for _ in 0..params {
            query = query.bind(Option::<i64>::None);
        }
        let rows = query.fetch_all(&self.pool).await?;
        let plan: Vec<String> = rows
            .iter()
            .filter_map(|r| r.try_get::<String, _>("detail").ok())
            .collect();

        observer.observe(label, statement, &plan);
        Ok(())
    }

    async fn song_by_id(&self, id: i64) -> Result<Option<Song>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, title, artist FROM song WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, title, artist)| Song {
            id: id.to_string(),
            title,
            artist,
        }))
    }

    async fn exists(&self, table: &str, id: i64) -> Result<bool> {
        let sql = format!("SELECT id FROM {} WHERE id = ?", table);
        let found: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// `None` filter selects everything; an id that cannot exist selects nothing.
    fn playlist_scope(playlist_id: Option<&str>) -> Option<Option<i64>> {
        match playlist_id {
            None => Some(None),
            Some(id) => row_id(id).map(Some),
        }
    }
}

impl CatalogSource for SqliteCatalog {
    // SQLite's lower() only folds ASCII, so text filters run here instead.
    async fn fetch_songs(&self, filter: &SongFilter) -> Result<Vec<Song>> {
        self.explain("songs", SELECT_SONGS, 0).await?;

        let rows: Vec<(i64, String, String)> = sqlx::query_as(SELECT_SONGS)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, artist)| Song {
                id: id.to_string(),
                title,
                artist,
            })
            .filter(|s| filter.matches(s))
            .collect())
    }

    async fn fetch_playlists(&self, name_filter: Option<&str>) -> Result<Vec<Playlist>> {
        let rows = self.fetch_playlist_rows_all().await?;

        Ok(rows
            .into_iter()
            .filter(|row| {
                contains_ignore_case(row.name.as_deref().unwrap_or_default(), name_filter)
            })
            .filter_map(|row| match Playlist::try_from(row) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Skipping playlist row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn fetch_entries(&self, playlist_id: Option<&str>) -> Result<Vec<PlaylistEntry>> {
        let Some(scope) = Self::playlist_scope(playlist_id) else {
            return Ok(Vec::new());
        };
        let rows = self.fetch_entry_rows_scoped(scope).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match PlaylistEntry::try_from(row) {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("Skipping playlist_song row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn fetch_follows(&self, playlist_id: Option<&str>) -> Result<Vec<Follow>> {
        let Some(scope) = Self::playlist_scope(playlist_id) else {
            return Ok(Vec::new());
        };
        let rows = self.fetch_follow_rows_scoped(scope).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| Follow::try_from(row).ok())
            .collect())
    }

    async fn fetch_user(&self, id: &str) -> Result<Option<User>> {
        let Some(id) = row_id(id) else {
            return Ok(None);
        };

        let row: Option<(i64, String)> =
            sqlx::query_as(r#"SELECT id, name FROM "user" WHERE id = ?"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, name)| User {
            id: id.to_string(),
            name,
        }))
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(r#"SELECT id, name FROM "user" ORDER BY id"#)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| User {
                id: id.to_string(),
                name,
            })
            .collect())
    }
}

impl SqliteCatalog {
    async fn fetch_playlist_rows_all(&self) -> Result<Vec<PlaylistRow>> {
        self.explain("playlists", SELECT_PLAYLISTS, 0).await?;

        let rows: Vec<(i64, Option<String>, Option<i64>, Option<String>)> =
            sqlx::query_as(SELECT_PLAYLISTS).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, owner_id, created_date)| PlaylistRow {
                id: Some(id.to_string()),
                name,
                owner_id: owner_id.map(|o| o.to_string()),
                created_date: created_date.as_deref().and_then(parse_datetime),
            })
            .collect())
    }

    async fn fetch_entry_rows_scoped(&self, playlist_id: Option<i64>) -> Result<Vec<EntryRow>> {
        self.explain("playlist entries", SELECT_ENTRIES, 1).await?;

        let rows: Vec<(i64, i64, Option<i64>)> = sqlx::query_as(SELECT_ENTRIES)
            .bind(playlist_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(playlist_id, song_id, position)| EntryRow {
                playlist_id: Some(playlist_id.to_string()),
                song_id: Some(song_id.to_string()),
                position,
            })
            .collect())
    }

    async fn fetch_follow_rows_scoped(&self, playlist_id: Option<i64>) -> Result<Vec<FollowRow>> {
        self.explain("playlist followers", SELECT_FOLLOWS, 1).await?;

        let rows: Vec<(i64, i64)> = sqlx::query_as(SELECT_FOLLOWS)
            .bind(playlist_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(playlist_id, follower_id)| FollowRow {
                playlist_id: Some(playlist_id.to_string()),
                follower_id: Some(follower_id.to_string()),
            })
            .collect())
    }
}

impl MigrationSource for SqliteCatalog {
    async fn fetch_playlist_rows(&self) -> Result<Vec<PlaylistRow>> {
        self.fetch_playlist_rows_all().await
    }

    async fn fetch_entry_rows(&self) -> Result<Vec<EntryRow>> {
        self.fetch_entry_rows_scoped(None).await
    }

    async fn fetch_follow_rows(&self) -> Result<Vec<FollowRow>> {
        self.fetch_follow_rows_scoped(None).await
    }
}

impl CatalogWriter for SqliteCatalog {
    async fn add_song(&self, song: NewSong) -> Result<String> {
        song.validate()?;

        let result = sqlx::query("INSERT INTO song (title, artist) VALUES (?, ?)")
            .bind(&song.title)
            .bind(&song.artist)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid().to_string();
        debug!("Added song {} ({} - {})", id, song.artist, song.title);
        Ok(id)
    }

    async fn update_song(&self, id: &str, update: SongUpdate) -> Result<Song> {
        update.validate()?;
        let row = required_id(id, "song")?;

        let mut song = self
            .song_by_id(row)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("song {}", id)))?;
        update.apply(&mut song);

        sqlx::query("UPDATE song SET title = ?, artist = ? WHERE id = ?")
            .bind(&song.title)
            .bind(&song.artist)
            .bind(row)
            .execute(&self.pool)
            .await?;

        Ok(song)
    }

    async fn delete_song(&self, id: &str) -> Result<()> {
        let row = required_id(id, "song")?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_song WHERE song_id = ?")
            .bind(row)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM song WHERE id = ?")
            .bind(row)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound(format!("song {}", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_user(&self, name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("name is required".into()));
        }

        let result = sqlx::query(r#"INSERT INTO "user" (name) VALUES (?)"#)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid().to_string())
    }

    async fn create_playlist(&self, playlist: NewPlaylist) -> Result<String> {
        playlist.validate()?;

        let owner = required_id(&playlist.owner_id, "owner")?;
        if !self.exists(r#""user""#, owner).await? {
            return Err(AppError::NotFound(format!("owner {}", playlist.owner_id)));
        }

        let mut song_rows = Vec::with_capacity(playlist.songs.len());
        for song in &playlist.songs {
            let row = required_id(&song.song_id, "song")?;
            if !self.exists("song", row).await? {
                return Err(AppError::NotFound(format!("song {}", song.song_id)));
            }
            song_rows.push((row, song.position));
        }

        let created = playlist
            .created_date
            .unwrap_or_else(|| chrono::Local::now().naive_local())
            .format(DATE_FORMAT)
            .to_string();

        let mut tx = self.pool.begin().await?;

        let playlist_id = sqlx::query(
            "INSERT INTO playlist (name, owner_id, created_date) VALUES (?, ?, ?)",
        )
        .bind(&playlist.name)
        .bind(owner)
        .bind(&created)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (song_id, position) in song_rows {
            sqlx::query(
                "INSERT INTO playlist_song (playlist_id, song_id, position) VALUES (?, ?, ?)",
            )
            .bind(playlist_id)
            .bind(song_id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("song {} listed twice", song_id))
                } else {
                    AppError::Database(e)
                }
            })?;
        }

        tx.commit().await?;

        info!("Created playlist {} ({})", playlist_id, playlist.name);
        Ok(playlist_id.to_string())
    }

    async fn follow_playlist(&self, playlist_id: &str, user_id: &str) -> Result<()> {
        let playlist = required_id(playlist_id, "playlist")?;
        let user = required_id(user_id, "user")?;

        if !self.exists("playlist", playlist).await? {
            return Err(AppError::NotFound(format!("playlist {}", playlist_id)));
        }
        if !self.exists(r#""user""#, user).await? {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        sqlx::query("INSERT INTO playlist_follower (playlist_id, follower_id) VALUES (?, ?)")
            .bind(playlist)
            .bind(user)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!(
                        "user {} already follows playlist {}",
                        user_id, playlist_id
                    ))
                } else {
                    AppError::Database(e)
                }
            })?;

        Ok(())
    }

    async fn delete_playlist(&self, id: &str) -> Result<()> {
        let row = required_id(id, "playlist")?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_song WHERE playlist_id = ?")
            .bind(row)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM playlist_follower WHERE playlist_id = ?")
            .bind(row)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM playlist WHERE id = ?")
            .bind(row)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound(format!("playlist {}", id)));
        }

        tx.commit().await?;
        Ok(())
    }
}
