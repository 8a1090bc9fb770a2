//! Runtime configuration for the command-line driver.
//!
//! Priority: command-line flags > environment (`.env` honoured) > `onitan.toml` > defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "onitan.toml";
pub const DATA_DIR_ENV: &str = "ONITAN_DATA_DIR";
pub const STORE_DIR_ENV: &str = "ONITAN_STORE_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_STORE_DIR: &str = ".onitan";

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    data: Option<DirSection>,
    store: Option<DirSection>,
}

#[derive(Debug, Default, Deserialize)]
struct DirSection {
    dir: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding `stage<N>.json`.
    pub data_dir: PathBuf,
    /// Directory for progress, stats and rewards.
    pub store_dir: PathBuf,
}

impl AppConfig {
    /// Resolve from the process environment and `onitan.toml` in the working directory.
    #[must_use]
    pub fn load(overrides: Overrides) -> Self {
        let _ = dotenvy::dotenv();
        let file = read_file_config(Path::new(CONFIG_FILE));
        Self::resolve(overrides, |key| std::env::var(key).ok(), file)
    }

    fn resolve(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Self {
        let file_data = file.data.and_then(|s| s.dir);
        let file_store = file.store.and_then(|s| s.dir);

        let data_dir = overrides
            .data_dir
            .or_else(|| env(DATA_DIR_ENV).map(PathBuf::from))
            .or_else(|| file_data.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let store_dir = overrides
            .store_dir
            .or_else(|| env(STORE_DIR_ENV).map(PathBuf::from))
            .or_else(|| file_store.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        tracing::debug!(data = %data_dir.display(), store = %store_dir.display(), "config resolved");
        Self {
            data_dir,
            store_dir,
        }
    }
}

fn read_file_config(path: &Path) -> FileConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return FileConfig::default();
    };
    match toml::from_str::<FileConfig>(&contents) {
        Ok(config) => {
            tracing::info!("Using settings from {}", path.display());
            config
        }
        Err(err) => {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), err);
            FileConfig::default()
        }
    }
}
