mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_DB_PATH: &str = "data/catalog.db";

/// CLI arguments that can be overridden by the TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub no_init: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: Level,
    pub initialize_schema: bool,
    pub collections: Vec<String>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        let log_level = match file.log_level.or_else(|| cli.log_level.clone()) {
            Some(level) => match parse_log_level(&level) {
                Some(level) => level,
                None => bail!("Invalid log level: {}", level),
            },
            None => Level::INFO,
        };

        let initialize_schema = file.initialize_schema.unwrap_or(!cli.no_init);
        let collections = file.collections.unwrap_or_default();

        Ok(Self {
            db_path,
            log_level,
            initialize_schema,
            collections,
        })
    }
}

fn parse_log_level(s: &str) -> Option<Level> {
    s.trim().parse().ok()
}
