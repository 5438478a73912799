pub mod embed;
pub mod orchestrator;
pub mod report;
pub mod rows;

pub use embed::{embed_playlists, EmbedOutcome, EmbeddedPlaylist, EmbeddedSong, SkippedRecord};
pub use orchestrator::{print_summary, CatalogMigrator};
pub use report::MigrationReport;
pub use rows::{EntryRow, FollowRow, PlaylistRow};
