pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod migrator;
pub mod service;

pub use aggregator::{ArtistStats, PlaylistSort, PlaylistView, Statistics};
pub use catalog::{CatalogSource, CatalogWriter, DocumentCatalog, DocumentSink, SqliteCatalog};
pub use config::Config;
pub use error::{AppError, Result};
pub use migrator::{CatalogMigrator, MigrationReport};
pub use service::CatalogService;
