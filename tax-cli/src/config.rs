//! `mtax.toml` loading and flag overrides.
//!
//! ```toml
//! [database]
//! backend = "sqlite"
//! connection_string = "household.db"
//!
//! [logging]
//! level = "warn"
//!
//! [documents]
//! root = "/home/ayla/tax-documents"
//! ```
//!
//! Every key is optional. Command-line flags win over the file, the file wins
//! over the built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tax_core::db::DbConfig;

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILENAME: &str = "mtax.toml";

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MtaxConfig {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub documents: DocumentsSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    pub backend: Option<String>,
    pub connection_string: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentsSection {
    pub root: Option<PathBuf>,
}

/// Settings after flags, file and defaults have been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub db: DbConfig,
    pub log_level: String,
    /// Empty when unset; document paths then resolve against the working
    /// directory.
    pub docs_root: PathBuf,
}

/// Values given on the command line, if any.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub backend: Option<String>,
    pub connection_string: Option<String>,
    pub log_level: Option<String>,
    pub docs_root: Option<PathBuf>,
}

impl MtaxConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Invalid mtax config")
    }

    /// Loads `path` if given, failing when it does not exist. Without a path,
    /// `./mtax.toml` is used when present and the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));

        if !config_path.exists() {
            if path.is_some() {
                bail!("Configuration file not found: {}", config_path.display());
            }
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("In {}", config_path.display()))
    }

    pub fn resolve(
        self,
        overrides: Overrides,
    ) -> ResolvedConfig {
        let defaults = DbConfig::default();

        ResolvedConfig {
            db: DbConfig {
                backend: overrides
                    .backend
                    .or(self.database.backend)
                    .unwrap_or(defaults.backend),
                connection_string: overrides
                    .connection_string
                    .or(self.database.connection_string)
                    .unwrap_or(defaults.connection_string),
            },
            log_level: overrides
                .log_level
                .or(self.logging.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            docs_root: overrides
                .docs_root
                .or(self.documents.root)
                .unwrap_or_default(),
        }
    }
}
