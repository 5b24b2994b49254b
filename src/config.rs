//! Application configuration.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file (explicit `--config PATH`, else `config.toml` in the
//!    platform config directory)
//! 3. Environment variables prefixed with `HASHDUPE_`
//!    (e.g. `HASHDUPE_ALGORITHM=blake3`, `HASHDUPE_IO_THREADS=8`)
//!
//! CLI flags are applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::scanner::hasher::{HashAlgorithm, DEFAULT_MMAP_THRESHOLD};
use crate::scanner::ExtensionFilter;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "HASHDUPE_";

/// File name of the hash cache store inside the cache directory.
pub const CACHE_FILE_NAME: &str = "hash_cache.db";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accepted extensions (`["mp4", ".jpg"]`); `None` accepts everything.
    pub extensions: Option<Vec<String>>,
    /// Hash candidate groups on a worker pool.
    pub parallel: bool,
    /// Allow the partial-hash prefilter for large files.
    pub multi_stage: bool,
    /// Use an all-cores CPU pool instead of the small I/O pool.
    pub cpu_pool: bool,
    /// Consult and update the persistent hash cache.
    pub cache_enabled: bool,
    /// Cache store location; defaults to the platform cache directory.
    pub cache_path: Option<PathBuf>,
    /// Digest name: sha256, sha384, sha512 or blake3.
    pub algorithm: String,
    /// Worker count for the I/O pool.
    pub io_threads: usize,
    /// Force the memory-mapped read path on or off; unset means auto.
    pub accelerated_io: Option<bool>,
    /// Files at or above this size use the memory-mapped path.
    pub mmap_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: None,
            parallel: true,
            multi_stage: true,
            cpu_pool: false,
            cache_enabled: true,
            cache_path: None,
            algorithm: HashAlgorithm::default().name().to_string(),
            io_threads: 4,
            accelerated_io: None,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }
}

impl Config {
    /// Build the layered figment for an optional explicit config file.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match config_file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(path) = Self::default_config_path() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load and validate the layered configuration.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, mistyped environment values, or a value
    /// rejected by [`validate`](Self::validate).
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_file {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }
        let config: Config = Self::figment(config_file)
            .extract()
            .context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable values before any scan work starts.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.algorithm.parse::<HashAlgorithm>()?;
        if self.io_threads == 0 {
            return Err(ValidationError::ZeroIoThreads);
        }
        if self.mmap_threshold == 0 {
            return Err(ValidationError::ZeroMmapThreshold);
        }
        self.extension_filter()?;
        Ok(())
    }

    /// Parsed digest algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedAlgorithm`] for unknown names.
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, ValidationError> {
        self.algorithm.parse()
    }

    /// Normalized extension filter, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyExtension`] for blank entries.
    pub fn extension_filter(&self) -> Result<Option<ExtensionFilter>, ValidationError> {
        self.extensions
            .as_deref()
            .map(ExtensionFilter::new)
            .transpose()
    }

    /// Effective cache path: the configured one or the platform default.
    #[must_use]
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        self.cache_path.clone().or_else(default_cache_path)
    }

    /// Write this configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// `config.toml` in the platform config directory.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// `hash_cache.db` in the platform cache directory.
#[must_use]
pub fn default_cache_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().join(CACHE_FILE_NAME))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "hashdupe", "hashdupe")
}
