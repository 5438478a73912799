use std::path::{Path, PathBuf};

use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::catalog::document::{SongDocument, UserDocument, SONGS, USERS};
use crate::catalog::query::SongFilter;
use crate::catalog::{DocumentSink, MigrationSource};
use crate::error::Result;
use crate::migrator::embed::embed_playlists;
use crate::migrator::report::MigrationReport;

/// Moves a normalized catalog into embedded playlist documents.
///
/// Each run reads the source once and replaces the destination collections
/// wholesale, so running it twice on the same source leaves the same result.
pub struct CatalogMigrator<'a, S, D> {
    source: &'a S,
    sink: &'a D,
    collection: String,
    copy_references: bool,
    results_dir: Option<PathBuf>,
}

impl<'a, S: MigrationSource, D: DocumentSink> CatalogMigrator<'a, S, D> {
    pub fn new(source: &'a S, sink: &'a D, collection: impl Into<String>) -> Self {
        Self {
            source,
            sink,
            collection: collection.into(),
            copy_references: true,
            results_dir: None,
        }
    }

    /// Also rewrite the `songs` and `users` collections. On by default.
    pub fn copy_references(mut self, copy: bool) -> Self {
        self.copy_references = copy;
        self
    }

    /// Save each report as JSON under `dir`.
    pub fn save_reports_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }

    pub async fn migrate(&self, dry_run: bool) -> Result<MigrationReport> {
        let mut report = MigrationReport::new(self.collection.clone(), dry_run);

        let playlists = self.source.fetch_playlist_rows().await?;
        let entries = self.source.fetch_entry_rows().await?;
        let follows = self.source.fetch_follow_rows().await?;

        info!(
            "Starting migration of {} playlists (dry_run={})",
            playlists.len(),
            dry_run
        );

        let outcome = embed_playlists(&playlists, &entries, &follows);

        let pb = ProgressBar::new(outcome.playlists.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        for playlist in &outcome.playlists {
            pb.set_message(format!("Embedding: {}", playlist.name));
            debug!(
                "Playlist {} ({}): {} songs, {} followers",
                playlist.name,
                playlist.id,
                playlist.songs.len(),
                playlist.followers.len()
            );
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.record_outcome(&outcome);

        if !dry_run {
            self.sink
                .replace_collection(&self.collection, &outcome.playlists)
                .await?;
        }

        if self.copy_references {
            let songs: Vec<SongDocument> = self
                .source
                .fetch_songs(&SongFilter::default())
                .await?
                .iter()
                .map(SongDocument::from)
                .collect();
            let users: Vec<UserDocument> = self
                .source
                .fetch_users()
                .await?
                .iter()
                .map(UserDocument::from)
                .collect();

            report.songs_copied = songs.len();
            report.users_copied = users.len();

            if !dry_run {
                self.sink.replace_collection(SONGS, &songs).await?;
                self.sink.replace_collection(USERS, &users).await?;
            }
        }

        if !report.skipped.is_empty() {
            warn!("{} source records skipped", report.skipped.len());
        }

        report.finish();

        if let Some(dir) = &self.results_dir {
            save_report(dir, &report).await?;
        }

        Ok(report)
    }
}

async fn save_report(results_dir: &Path, report: &MigrationReport) -> Result<()> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    tokio::fs::create_dir_all(results_dir).await?;

    let filename = results_dir.join(format!("migration_report_{}.json", timestamp));
    let json = serde_json::to_string_pretty(report)?;

    tokio::fs::write(&filename, json).await?;

    info!("Migration report saved to: {}", filename.display());

    Ok(())
}

pub fn print_summary(report: &MigrationReport) {
    println!();
    println!("{}", "=".repeat(60));
    println!("{}", "MIGRATION SUMMARY".bold());
    println!("{}", "=".repeat(60));
    println!("Destination collection: {}", report.collection);
    println!(
        "Playlists migrated: {}",
        report.playlists_migrated.to_string().green()
    );
    println!("Songs embedded: {}", report.songs_embedded);
    println!("Followers embedded: {}", report.followers_embedded);
    println!("Songs copied: {}", report.songs_copied);
    println!("Users copied: {}", report.users_copied);

    let skipped = report.skipped.len().to_string();
    if report.skipped.is_empty() {
        println!("Skipped records: {}", skipped.green());
    } else {
        println!("Skipped records: {}", skipped.red());
        for record in &report.skipped {
            println!(
                "  {} #{}: {}",
                record.collection,
                record.index,
                record.reason.yellow()
            );
        }
    }
    println!("{}", "=".repeat(60));
}
