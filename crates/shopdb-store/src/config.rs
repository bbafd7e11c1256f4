//! Store configuration.
//!
//! Every setting is a command-line flag with an environment fallback. A `.env`
//! file in the working directory is loaded before parsing.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DB_NAME` - Database name; storage lives in `<SHOPDB_DATA_DIR>/<DB_NAME>`
//!
//! ## Optional
//! - `SHOPDB_DATA_DIR` - Parent directory for databases (default: ./data)
//! - `SHOPDB_CACHE_MB` - Page cache size in megabytes (default: 64)

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shopdb_core::StorageConfig;
use thiserror::Error;

/// Default parent directory for databases.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default page cache size in megabytes.
pub const DEFAULT_CACHE_MB: u64 = 64;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
    /// A variable is set to an unusable value: (name, reason).
    #[error("invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Resolved store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopConfig {
    /// Database name.
    pub db_name: String,
    /// Parent directory for databases.
    pub data_dir: PathBuf,
    /// Page cache size in megabytes.
    pub cache_mb: u64,
}

impl ShopConfig {
    /// Create a configuration for a database under the default directory.
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_mb: DEFAULT_CACHE_MB,
        }
    }

    /// Set the parent directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Directory holding this database's files.
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }

    /// Storage engine configuration for this database.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(self.storage_path())
            .with_cache_capacity(self.cache_mb.saturating_mul(BYTES_PER_MB))
    }
}

/// Command-line arguments for the `shopdb` binary.
#[derive(Parser, Debug)]
#[command(name = "shopdb")]
#[command(version, about = "shopdb catalog store", long_about = None)]
pub struct Args {
    /// Database name.
    #[arg(long, env = "DB_NAME", global = true)]
    pub db_name: Option<String>,

    /// Parent directory for databases.
    #[arg(long, env = "SHOPDB_DATA_DIR", global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Page cache size in megabytes.
    #[arg(long, env = "SHOPDB_CACHE_MB", global = true)]
    pub cache_mb: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// `shopdb` subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the bound schema as JSON
    Describe,
    /// Insert the demo catalog
    Seed,
    /// List products with their category and tags
    Products,
}

impl Args {
    /// Validate arguments into a store configuration.
    pub fn into_config(self) -> Result<(ShopConfig, Command), ConfigError> {
        let db_name = self
            .db_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DB_NAME".into()))?;
        if db_name.contains(['/', '\\']) || db_name == "." || db_name == ".." {
            return Err(ConfigError::InvalidEnvVar(
                "DB_NAME".into(),
                format!("'{db_name}' is not a plain directory name"),
            ));
        }

        let cache_mb = match self.cache_mb {
            None => DEFAULT_CACHE_MB,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(mb) if mb > 0 && mb.checked_mul(BYTES_PER_MB).is_some() => mb,
                _ => {
                    return Err(ConfigError::InvalidEnvVar(
                        "SHOPDB_CACHE_MB".into(),
                        format!("expected a positive megabyte count, got '{raw}'"),
                    ))
                }
            },
        };

        let config = ShopConfig {
            db_name,
            data_dir: self.data_dir,
            cache_mb,
        };
        Ok((config, self.command))
    }
}
