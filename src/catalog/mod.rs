pub mod document;
pub mod explain;
pub mod models;
pub mod query;
pub mod sqlite;

use std::future::Future;

use serde::Serialize;

use crate::error::Result;
use crate::migrator::embed::EmbeddedPlaylist;
use crate::migrator::rows::{EntryRow, FollowRow, PlaylistRow};

pub use document::DocumentCatalog;
pub use explain::{QueryObserver, TracingObserver};
pub use models::{
    Follow, NewPlaylist, NewPlaylistSong, NewSong, Playlist, PlaylistEntry, Song, SongUpdate, User,
};
pub use query::{Page, Paginated, SongFilter};
pub use sqlite::SqliteCatalog;

/// Read side of a catalog store.
///
/// Each call is an independent read. Nothing ties two calls to the same
/// snapshot, so related collections may reflect different points in time.
pub trait CatalogSource: Send + Sync {
    fn fetch_songs(&self, filter: &SongFilter) -> impl Future<Output = Result<Vec<Song>>> + Send;

    /// Playlists whose name contains `name_filter`, case-insensitively.
    fn fetch_playlists(
        &self,
        name_filter: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Playlist>>> + Send;

    fn fetch_entries(
        &self,
        playlist_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<PlaylistEntry>>> + Send;

    fn fetch_follows(
        &self,
        playlist_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Follow>>> + Send;

    fn fetch_user(&self, id: &str) -> impl Future<Output = Result<Option<User>>> + Send;

    fn fetch_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send;
}

/// Write side of a catalog store.
pub trait CatalogWriter: Send + Sync {
    fn add_song(&self, song: NewSong) -> impl Future<Output = Result<String>> + Send;

    fn update_song(
        &self,
        id: &str,
        update: SongUpdate,
    ) -> impl Future<Output = Result<Song>> + Send;

    /// Removes the song and every playlist entry referencing it.
    fn delete_song(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn add_user(&self, name: &str) -> impl Future<Output = Result<String>> + Send;

    /// Fails without writing anything if the owner or any song is unknown.
    fn create_playlist(&self, playlist: NewPlaylist) -> impl Future<Output = Result<String>> + Send;

    /// A (playlist, user) pair may be followed at most once.
    fn follow_playlist(
        &self,
        playlist_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Removes the playlist together with its entries and follows.
    fn delete_playlist(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Normalized source rows for the migrator. Columns that may be missing in
/// the source are optional here; validation happens per record during
/// embedding.
pub trait MigrationSource: CatalogSource {
    fn fetch_playlist_rows(&self) -> impl Future<Output = Result<Vec<PlaylistRow>>> + Send;

    fn fetch_entry_rows(&self) -> impl Future<Output = Result<Vec<EntryRow>>> + Send;

    fn fetch_follow_rows(&self) -> impl Future<Output = Result<Vec<FollowRow>>> + Send;
}

/// Destination of embedded documents.
pub trait DocumentSink: Send + Sync {
    /// Replaces the whole collection. Prior contents are discarded.
    fn replace_collection<T: Serialize + Sync>(
        &self,
        name: &str,
        docs: &[T],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Appends one playlist document, leaving existing documents in place.
    fn insert_embedded_playlist(
        &self,
        collection: &str,
        doc: &EmbeddedPlaylist,
    ) -> impl Future<Output = Result<()>> + Send;
}
