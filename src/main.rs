use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use playlist_catalog::catalog::{
    NewPlaylist, NewPlaylistSong, NewSong, Page, SongFilter, SongUpdate, TracingObserver,
};
use playlist_catalog::migrator::print_summary;
use playlist_catalog::{
    CatalogMigrator, CatalogService, CatalogSource, CatalogWriter, Config, DocumentCatalog,
    PlaylistSort, SqliteCatalog, Statistics,
};

#[derive(Parser)]
#[command(name = "playlist-catalog")]
#[command(about = "Playlist views, artist statistics and catalog migration")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log query plans for every read (implies debug logging)
    #[arg(long, global = true)]
    explain: bool,

    /// Store to operate on
    #[arg(long, global = true, value_enum, env = "CATALOG_BACKEND", default_value = "relational")]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Relational,
    Document,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Input,
    Name,
    Created,
}

impl From<SortArg> for PlaylistSort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Input => PlaylistSort::Input,
            SortArg::Name => PlaylistSort::Name,
            SortArg::Created => PlaylistSort::Created,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List songs, filtered by title and artist
    Songs {
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 10)]
        per_page: usize,
    },

    /// Add a song
    AddSong {
        #[arg(long)]
        title: String,

        #[arg(long)]
        artist: String,
    },

    /// Change the title and/or artist of a song
    UpdateSong {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        artist: Option<String>,
    },

    /// Delete a song and remove it from every playlist
    DeleteSong { id: String },

    /// Add a user
    AddUser {
        #[arg(long)]
        name: String,
    },

    /// List playlists with owner, songs and follower count
    Playlists {
        /// Only playlists whose name contains this text
        #[arg(long)]
        name: Option<String>,

        #[arg(long, value_enum, default_value = "input")]
        sort: SortArg,
    },

    /// Show one playlist with owner and followers resolved
    Playlist { id: String },

    /// Create a playlist owned by an existing user
    AddPlaylist {
        #[arg(long)]
        name: String,

        #[arg(long)]
        owner: String,

        /// Song to include, as SONG_ID:POSITION (repeatable)
        #[arg(long = "song", value_parser = parse_song_arg)]
        songs: Vec<NewPlaylistSong>,
    },

    /// Follow a playlist
    Follow { playlist: String, user: String },

    /// Delete a playlist with its entries and followers
    DeletePlaylist { id: String },

    /// Per-artist playlist statistics
    Statistics,

    /// Rewrite the normalized catalog into embedded playlist documents
    Migrate {
        /// Preview migration without writing documents
        #[arg(long)]
        dry_run: bool,

        /// Where the normalized rows come from
        #[arg(long, value_enum, default_value = "relational")]
        from: Backend,

        /// Only migrate playlists; leave songs and users untouched
        #[arg(long)]
        playlists_only: bool,
    },
}

fn parse_song_arg(arg: &str) -> std::result::Result<NewPlaylistSong, String> {
    let (song_id, position) = arg
        .rsplit_once(':')
        .ok_or_else(|| format!("expected SONG_ID:POSITION, got {}", arg))?;
    let position = position
        .parse()
        .map_err(|_| format!("invalid position in {}", arg))?;

    Ok(NewPlaylistSong {
        song_id: song_id.to_string(),
        position,
    })
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose || cli.explain);

    let config = Config::from_env().context("Failed to load configuration")?;

    let missing = config.get_missing_config();
    if !missing.is_empty() {
        println!("{}", "Missing configuration:".red());
        for item in &missing {
            println!("   - {}", item);
        }
        std::process::exit(1);
    }

    match cli.command {
        Commands::Migrate {
            dry_run,
            from,
            playlists_only,
        } => migrate(&config, from, dry_run, playlists_only, cli.explain).await,
        command => match cli.backend {
            Backend::Relational => {
                let store = open_relational(&config, cli.explain).await?;
                run(&store, command).await
            }
            Backend::Document => {
                let store = open_document(&config, cli.explain)?;
                run(&store, command).await
            }
        },
    }
}

async fn open_relational(config: &Config, explain: bool) -> Result<SqliteCatalog> {
    let store = SqliteCatalog::open(&config.database_path)
        .await
        .context("Failed to open relational catalog")?;
    Ok(if explain {
        store.with_observer(Arc::new(TracingObserver))
    } else {
        store
    })
}

fn open_document(config: &Config, explain: bool) -> Result<DocumentCatalog> {
    let store = DocumentCatalog::new(
        config.document_dir.clone(),
        config.embedded_collection.clone(),
    )
    .context("Failed to open document catalog")?;
    Ok(if explain {
        store.with_observer(Arc::new(TracingObserver))
    } else {
        store
    })
}

async fn run<S: CatalogSource + CatalogWriter>(store: &S, command: Commands) -> Result<()> {
    let service = CatalogService::new(store);

    match command {
        Commands::Songs {
            title,
            artist,
            page,
            per_page,
        } => {
            let filter = SongFilter { title, artist };
            let page = Page::new(page, per_page)?;
            let songs = service.songs(&filter, page).await?;

            if songs.is_empty() {
                println!("{}", "No songs found for the given filters".yellow());
            } else {
                print_json(&songs)?;
            }
        }
        Commands::AddSong { title, artist } => {
            let id = store.add_song(NewSong { title, artist }).await?;
            println!("{} {}", "Song added:".green(), id);
        }
        Commands::UpdateSong { id, title, artist } => {
            let song = store.update_song(&id, SongUpdate { title, artist }).await?;
            println!("{}", "Song updated".green());
            print_json(&song)?;
        }
        Commands::DeleteSong { id } => {
            store.delete_song(&id).await?;
            println!("{} {}", "Song deleted:".green(), id);
        }
        Commands::AddUser { name } => {
            let id = store.add_user(&name).await?;
            println!("{} {}", "User added:".green(), id);
        }
        Commands::Playlists { name, sort } => {
            let views = service.playlists(name.as_deref(), sort.into()).await?;

            if views.is_empty() {
                println!("{}", "No playlists found".yellow());
            } else {
                print_json(&views)?;
                println!("\n{}", format!("Total: {} playlists", views.len()).cyan());
            }
        }
        Commands::Playlist { id } => {
            let detail = service.playlist(&id).await?;
            print_json(&detail)?;
        }
        Commands::AddPlaylist { name, owner, songs } => {
            let id = store
                .create_playlist(NewPlaylist {
                    name,
                    owner_id: owner,
                    created_date: None,
                    songs,
                })
                .await?;
            println!("{} {}", "Playlist created:".green(), id);
        }
        Commands::Follow { playlist, user } => {
            store.follow_playlist(&playlist, &user).await?;
            println!("{}", "Playlist followed".green());
        }
        Commands::DeletePlaylist { id } => {
            store.delete_playlist(&id).await?;
            println!("{} {}", "Playlist deleted:".green(), id);
        }
        Commands::Statistics => match service.statistics().await? {
            Statistics::Found(stats) => print_json(&stats)?,
            Statistics::Empty => println!("{}", "No statistics found".yellow()),
        },
        Commands::Migrate { .. } => {
            anyhow::bail!("migrate does not run against a single store");
        }
    }

    Ok(())
}

async fn migrate(
    config: &Config,
    from: Backend,
    dry_run: bool,
    playlists_only: bool,
    explain: bool,
) -> Result<()> {
    println!("{}", "Catalog Migration".cyan().bold());
    println!("{}", "=".repeat(50));

    if dry_run {
        println!("{}", "DRY RUN MODE - No documents will be written".yellow());
    }

    let sink = open_document(config, false)?;

    let report = match from {
        Backend::Relational => {
            let source = open_relational(config, explain).await?;
            CatalogMigrator::new(&source, &sink, config.embedded_collection.clone())
                .copy_references(!playlists_only)
                .save_reports_to(config.results_dir.clone())
                .migrate(dry_run)
                .await
        }
        Backend::Document => {
            let source = open_document(config, explain)?;
            CatalogMigrator::new(&source, &sink, config.embedded_collection.clone())
                .copy_references(!playlists_only)
                .save_reports_to(config.results_dir.clone())
                .migrate(dry_run)
                .await
        }
    }
    .context("Migration failed")?;

    print_summary(&report);

    if !dry_run {
        println!("\n{}", "Migration completed!".green());
    } else {
        println!("\n{}", "Dry run completed - no changes made".yellow());
    }

    Ok(())
}
