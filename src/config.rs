use std::path::PathBuf;

use crate::error::{AppError, Result};

const DEFAULT_DATABASE_PATH: &str = "catalog.db";
const DEFAULT_DOCUMENT_DIR: &str = "catalog_documents";
const DEFAULT_EMBEDDED_COLLECTION: &str = "playlists";
const DEFAULT_RESULTS_DIR: &str = "migration_results";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub document_dir: PathBuf,
    pub embedded_collection: String,
    pub results_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_path = std::env::var("CATALOG_DATABASE_PATH")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());

        let document_dir = std::env::var("CATALOG_DOCUMENT_DIR")
            .unwrap_or_else(|_| DEFAULT_DOCUMENT_DIR.to_string());

        let embedded_collection = std::env::var("CATALOG_EMBEDDED_COLLECTION")
            .unwrap_or_else(|_| DEFAULT_EMBEDDED_COLLECTION.to_string());

        let results_dir = std::env::var("CATALOG_RESULTS_DIR")
            .unwrap_or_else(|_| DEFAULT_RESULTS_DIR.to_string());

        if embedded_collection.contains(['/', '\\']) {
            return Err(AppError::Config(format!(
                "CATALOG_EMBEDDED_COLLECTION must be a plain name, got {}",
                embedded_collection
            )));
        }

        Ok(Self {
            database_path: PathBuf::from(database_path),
            document_dir: PathBuf::from(document_dir),
            embedded_collection,
            results_dir: PathBuf::from(results_dir),
        })
    }

    pub fn get_missing_config(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.database_path.as_os_str().is_empty() {
            missing.push("CATALOG_DATABASE_PATH".to_string());
        }
        if self.document_dir.as_os_str().is_empty() {
            missing.push("CATALOG_DOCUMENT_DIR".to_string());
        }
        if self.embedded_collection.is_empty() {
            missing.push("CATALOG_EMBEDDED_COLLECTION".to_string());
        }
        if self.results_dir.as_os_str().is_empty() {
            missing.push("CATALOG_RESULTS_DIR".to_string());
        }

        missing
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            document_dir: PathBuf::from(DEFAULT_DOCUMENT_DIR),
            embedded_collection: DEFAULT_EMBEDDED_COLLECTION.to_string(),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_nothing_missing() {
        let config = Config::default();
        assert!(config.get_missing_config().is_empty());
        assert_eq!(config.embedded_collection, "playlists");
    }

    #[test]
    fn test_missing_config_reports_empty_settings() {
        let config = Config {
            database_path: PathBuf::new(),
            embedded_collection: String::new(),
            ..Config::default()
        };

        let missing = config.get_missing_config();
        assert_eq!(
            missing,
            vec!["CATALOG_DATABASE_PATH", "CATALOG_EMBEDDED_COLLECTION"]
        );
    }
}
