//! Logging infrastructure for hashdupe.
//!
//! Logging goes through the `log` facade types with an `env_logger` backend,
//! but nothing is installed process-wide. [`init_logging`] builds a backend
//! and wraps it in a [`Logger`] handle, and that handle is passed explicitly
//! to every component that wants to log (walker, hasher, cache, finder).
//! Library consumers can supply any `log::Log` implementation instead, or use
//! [`Logger::discard`].
//!
//! Log levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info level
//!
//! # Example
//!
//! ```rust
//! use hashdupe::logging::Logger;
//!
//! let logger = Logger::discard().with_target("hashdupe::example");
//! logger.info(format_args!("scanning {} roots", 1));
//! ```

use env_logger::Builder;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::env;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// An explicitly constructed logging handle.
///
/// Cloning is cheap; clones share the same sink.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Log>,
    level: LevelFilter,
    target: &'static str,
}

impl Logger {
    /// Wrap an arbitrary `log::Log` sink.
    #[must_use]
    pub fn new(sink: Arc<dyn Log>, level: LevelFilter) -> Self {
        Self {
            sink,
            level,
            target: "hashdupe",
        }
    }

    /// A logger that drops every record.
    #[must_use]
    pub fn discard() -> Self {
        Self::new(Arc::new(NullSink), LevelFilter::Off)
    }

    /// Same sink, different record target.
    #[must_use]
    pub fn with_target(&self, target: &'static str) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            level: self.level,
            target,
        }
    }

    /// Target attached to records from this handle.
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Maximum level this handle forwards.
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Whether a record at `level` would reach the sink.
    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
            && self
                .sink
                .enabled(&Metadata::builder().level(level).target(self.target).build())
    }

    /// Emit a record at `level`.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if level > self.level {
            return;
        }
        let record = Record::builder()
            .args(args)
            .level(level)
            .target(self.target)
            .module_path_static(Some(self.target))
            .build();
        if self.sink.enabled(record.metadata()) {
            self.sink.log(&record);
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Trace, args);
    }

    /// Flush the underlying sink.
    pub fn flush(&self) {
        self.sink.flush();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::discard()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

struct NullSink;

impl Log for NullSink {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        false
    }

    fn log(&self, _: &Record<'_>) {}

    fn flush(&self) {}
}

/// Build the stderr logger used by the binary.
///
/// # Priority
///
/// 1. If `RUST_LOG` environment variable is set, it takes precedence
/// 2. If `quiet` is true: Error level only
/// 3. If `verbose >= 2`: Trace level
/// 4. If `verbose == 1`: Debug level
/// 5. Default: Info level
///
/// The returned handle is not registered with the `log` facade; it can be
/// built any number of times.
#[must_use]
pub fn init_logging(verbose: u8, quiet: bool) -> Logger {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    configure_format(&mut builder, verbose);

    let backend = builder.build();
    let level = backend.filter();
    let logger = Logger::new(Arc::new(backend), level);
    logger.debug(format_args!(
        "Logging initialized at level {}",
        level_name(level)
    ));
    logger
}

/// Determine the log level from CLI flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Debug builds: timestamp, level and target. Release builds: level and message.
fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let level_style = buf.default_level_style(level);

            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} [{}] {}",
                    timestamp,
                    level,
                    record.target(),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} {}",
                    timestamp,
                    level,
                    record.args()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let level_style = buf.default_level_style(level);
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        });
    }
}

/// Lowercase name of a level filter.
#[must_use]
pub fn level_name(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
