//! Command-line interface definitions.
//!
//! Flags override the loaded configuration (defaults, config file, then
//! `HASHDUPE_*` environment variables).
//!
//! # Example
//!
//! ```bash
//! # Scan a directory
//! hashdupe ~/Downloads
//!
//! # Only videos and photos, JSON output for scripting
//! hashdupe ~/Downloads --ext mp4,jpg --output json
//!
//! # Show cache statistics without scanning
//! hashdupe --cache-stats
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::Config;

/// Find duplicate files by content hash.
#[derive(Debug, Parser)]
#[command(name = "hashdupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan for duplicates
    #[arg(
        value_name = "PATH",
        required_unless_present_any = ["cache_stats", "cleanup_cache", "clear_cache"]
    )]
    pub path: Option<PathBuf>,

    /// Only scan files with these extensions (comma separated, e.g. mp4,jpg)
    #[arg(long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Hash on the calling thread only
    #[arg(long)]
    pub no_parallel: bool,

    /// Disable the partial-hash prefilter for large files
    #[arg(long)]
    pub no_multi_stage: bool,

    /// Hash on a pool with one worker per core instead of the I/O pool
    #[arg(long)]
    pub cpu_pool: bool,

    /// Digest algorithm (sha256, sha384, sha512, blake3)
    #[arg(long, value_name = "NAME")]
    pub algorithm: Option<String>,

    /// Number of I/O threads for hashing
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Path to the hash cache database
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Disable hash caching
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Clear the hash cache before scanning
    #[arg(long, conflicts_with = "no_cache")]
    pub clear_cache: bool,

    /// Print cache statistics
    #[arg(long, conflicts_with = "no_cache")]
    pub cache_stats: bool,

    /// Remove cache entries for files that no longer exist
    #[arg(long, conflicts_with = "no_cache")]
    pub cleanup_cache: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Print errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Apply flags on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(extensions) = &self.extensions {
            config.extensions = Some(extensions.clone());
        }
        if self.no_parallel {
            config.parallel = false;
        }
        if self.no_multi_stage {
            config.multi_stage = false;
        }
        if self.cpu_pool {
            config.cpu_pool = true;
        }
        if let Some(algorithm) = &self.algorithm {
            config.algorithm = algorithm.clone();
        }
        if let Some(threads) = self.io_threads {
            config.io_threads = threads;
        }
        if let Some(path) = &self.cache {
            config.cache_path = Some(path.clone());
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
    }
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// JSON document for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
