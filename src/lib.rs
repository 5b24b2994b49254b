//! hashdupe - duplicate file finder
//!
//! Finds files with identical content under a directory tree by grouping on
//! size, optionally prefiltering large files with partial hashes, and
//! confirming with a full-content digest. Full hashes are cached in SQLite so
//! that reruns over an unchanged tree skip the hashing entirely.

pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig, ScanHooks, ScanSummary};
use crate::error::ExitCode;
use crate::logging::Logger;
use crate::output::{write_cache_report, JsonOutput, TextOutput};
use crate::progress::{Phase, Progress};

/// Run the binary with parsed arguments and return its exit code.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unscannable root, cache
/// maintenance failures, or failure to write the report.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let logger = logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    let finder = DuplicateFinder::new(FinderConfig::from_config(&config, &logger)?);

    if cli.clear_cache {
        finder
            .clear_cache()
            .context("Failed to clear the hash cache")?;
    }
    if cli.cleanup_cache {
        let removed = finder
            .cleanup_cache()
            .context("Failed to clean up the hash cache")?;
        logger.info(format_args!("Removed {} stale cache entries", removed));
    }

    let code = match cli.path.as_deref() {
        Some(root) => scan(&cli, root, &finder, &logger)?,
        None => ExitCode::Success,
    };

    if cli.cache_stats {
        let report = finder.cache_stats();
        let mut out = io::stdout().lock();
        match cli.output {
            OutputFormat::Text => write_cache_report(&mut out, &report)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut out, &report)?;
                writeln!(out)?;
            }
        }
    }

    close_cache(finder, &logger);
    logger.flush();
    Ok(code)
}

fn scan(
    cli: &Cli,
    root: &Path,
    finder: &DuplicateFinder,
    logger: &Logger,
) -> anyhow::Result<ExitCode> {
    let mut hooks = ScanHooks::new();
    match signal::install_handler() {
        Ok(handler) => hooks = hooks.with_cancel(Arc::new(handler)),
        Err(e) => logger.warn(format_args!("Ctrl+C handling unavailable: {}", e)),
    }

    let progress = Progress::new(cli.quiet || cli.output == OutputFormat::Json);
    hooks = hooks
        .with_scan_progress(progress.phase(Phase::Scanning))
        .with_hash_progress(progress.phase(Phase::Hashing));

    let (groups, summary) = finder
        .find_duplicates(root, &hooks)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    let code = exit_code_for(&groups, &summary);
    let cache = finder.cache_stats();

    let mut out = io::stdout().lock();
    match cli.output {
        OutputFormat::Text => TextOutput::new(&groups, &summary, &cache).write_to(&mut out)?,
        OutputFormat::Json => {
            JsonOutput::new(&groups, &summary, &cache, code).write_to(&mut out, true)?
        }
    }
    Ok(code)
}

/// Exit code for a finished scan.
///
/// Cancellation wins, then inaccessible paths, then whether anything was
/// found.
#[must_use]
pub fn exit_code_for(groups: &[DuplicateGroup], summary: &ScanSummary) -> ExitCode {
    if summary.cancelled {
        ExitCode::Interrupted
    } else if !summary.access_issues.is_empty() {
        ExitCode::PartialSuccess
    } else if groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}

fn close_cache(finder: DuplicateFinder, logger: &Logger) {
    let Some(cache) = finder.into_config().cache else {
        return;
    };
    if let Ok(cache) = Arc::try_unwrap(cache) {
        if let Err(e) = cache.close() {
            logger.warn(format_args!("Failed to close the hash cache: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{AccessIssue, FileRecord};
    use std::path::PathBuf;

    fn group() -> DuplicateGroup {
        DuplicateGroup::new(
            "h".into(),
            vec![
                FileRecord::new(PathBuf::from("/a"), 1, 0.0),
                FileRecord::new(PathBuf::from("/b"), 1, 0.0),
            ],
        )
    }

    #[test]
    fn test_exit_code_for() {
        let clean = ScanSummary::default();
        assert_eq!(exit_code_for(&[group()], &clean), ExitCode::Success);
        assert_eq!(exit_code_for(&[], &clean), ExitCode::NoDuplicates);

        let with_issues = ScanSummary {
            access_issues: vec![AccessIssue {
                path: PathBuf::from("/x"),
                reason: "denied".into(),
                is_directory: false,
            }],
            ..Default::default()
        };
        assert_eq!(exit_code_for(&[group()], &with_issues), ExitCode::PartialSuccess);

        let cancelled = ScanSummary {
            cancelled: true,
            ..with_issues
        };
        assert_eq!(exit_code_for(&[], &cancelled), ExitCode::Interrupted);
    }
}
