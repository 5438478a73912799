use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::migrator::embed::{EmbedOutcome, SkippedRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub collection: String,
    pub dry_run: bool,
    pub playlists_migrated: usize,
    pub songs_embedded: usize,
    pub followers_embedded: usize,
    pub songs_copied: usize,
    pub users_copied: usize,
    pub skipped: Vec<SkippedRecord>,
    pub finished_at: Option<DateTime<Local>>,
}

impl MigrationReport {
    pub fn new(collection: String, dry_run: bool) -> Self {
        Self {
            collection,
            dry_run,
            playlists_migrated: 0,
            songs_embedded: 0,
            followers_embedded: 0,
            songs_copied: 0,
            users_copied: 0,
            skipped: Vec::new(),
            finished_at: None,
        }
    }

    pub fn record_outcome(&mut self, outcome: &EmbedOutcome) {
        self.playlists_migrated = outcome.playlists.len();
        self.songs_embedded = outcome.playlists.iter().map(|p| p.songs.len()).sum();
        self.followers_embedded = outcome.playlists.iter().map(|p| p.followers.len()).sum();
        self.skipped = outcome.skipped.clone();
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }
}
