use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bookstore::{DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_PAGE_SIZE};
use crate::errors::DbError;

pub const CONFIG_FILE_NAME: &str = "bookstore.toml";

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One compact JSON document per line.
    #[default]
    Ndjson,
    /// Indented JSON.
    Pretty,
}

/// Settings from one layer (CLI, environment or a TOML file). Unset fields
/// fall through to the next layer, then to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: Option<String>,
    pub collection: Option<String>,
    pub page_size: Option<usize>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub format: Option<OutputFormat>,
}

impl AppConfig {
    /// Fills every unset field from `lower`.
    pub fn fill_from(&mut self, lower: Self) {
        if self.database.is_none() {
            self.database = lower.database;
        }
        if self.collection.is_none() {
            self.collection = lower.collection;
        }
        if self.page_size.is_none() {
            self.page_size = lower.page_size;
        }
        if self.log_dir.is_none() {
            self.log_dir = lower.log_dir;
        }
        if self.log_level.is_none() {
            self.log_level = lower.log_level;
        }
        if self.format.is_none() {
            self.format = lower.format;
        }
    }

    #[must_use]
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or(DEFAULT_COLLECTION)
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// # Errors
    /// Returns `DbError::Config` for an empty name or a zero page size.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.database().is_empty() || self.collection().is_empty() {
            return Err(DbError::Config("database and collection names must not be empty".into()));
        }
        if self.page_size() == 0 {
            return Err(DbError::Config("page_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Reads one TOML file.
    ///
    /// # Errors
    /// Returns `DbError::Io` if the file cannot be read and `DbError::Config` if it is not valid.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
    }

    /// The `BOOKSTORE_*` environment layer, read through `lookup`.
    ///
    /// # Errors
    /// Returns `DbError::Config` for an unparsable `BOOKSTORE_PAGE_SIZE`.
    pub fn from_env(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let page_size = lookup("BOOKSTORE_PAGE_SIZE")
            .map(|s| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|e| DbError::Config(format!("BOOKSTORE_PAGE_SIZE={s}: {e}")))
            })
            .transpose()?;
        Ok(Self {
            database: lookup("BOOKSTORE_DATABASE"),
            collection: lookup("BOOKSTORE_COLLECTION"),
            page_size,
            log_dir: lookup("BOOKSTORE_LOG_DIR").map(PathBuf::from),
            log_level: lookup("BOOKSTORE_LOG_LEVEL"),
            format: None,
        })
    }
}

/// Config files in lookup order: `--config`, `BOOKSTORE_CONFIG`,
/// `<user config dir>/bookstore.toml`, `./bookstore.toml`.
#[must_use]
pub fn config_paths(cli_cfg: Option<&Path>, lookup: &impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = cli_cfg {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = lookup("BOOKSTORE_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Merges the layers: `cli` > environment > files (earlier paths win) > defaults.
/// A file named explicitly by `--config` must exist and parse; the implicit
/// locations are skipped when absent.
///
/// # Errors
/// Returns `DbError::Config`/`DbError::Io` for a bad explicit file or a bad
/// environment value, and the [`AppConfig::validate`] errors.
pub fn load_layers(
    cli: AppConfig,
    explicit: Option<&Path>,
    paths: &[PathBuf],
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, DbError> {
    let mut cfg = cli;
    cfg.fill_from(AppConfig::from_env(lookup)?);
    for path in paths {
        let is_explicit = explicit.is_some_and(|e| e == path);
        if !is_explicit && !path.exists() {
            continue;
        }
        match AppConfig::from_file(path) {
            Ok(file_cfg) => {
                log::debug!("loaded config from {}", path.display());
                cfg.fill_from(file_cfg);
            }
            Err(e) if is_explicit => return Err(e),
            Err(e) => log::warn!("ignoring config file: {e}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// [`load_layers`] over the process environment and the standard file locations.
///
/// # Errors
/// See [`load_layers`].
pub fn load_config(cli: AppConfig, cli_cfg: Option<&Path>) -> Result<AppConfig, DbError> {
    let lookup = |k: &str| std::env::var(k).ok();
    let paths = config_paths(cli_cfg, &lookup);
    load_layers(cli, cli_cfg, &paths, &lookup)
}
