//! Structured error handling, validation errors and exit codes.

use serde::Serialize;

/// Exit codes for the hashdupe binary.
///
/// - 0: Success (completed normally, duplicates found)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found (completed normally, no duplicates)
/// - 3: Partial success (completed, but some paths were inaccessible)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Scan completed and duplicates were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Scan completed but no duplicates were found.
    NoDuplicates = 2,
    /// Scan completed but some paths could not be read.
    PartialSuccess = 3,
    /// Scan was cancelled by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "HD000",
            Self::GeneralError => "HD001",
            Self::NoDuplicates => "HD002",
            Self::PartialSuccess => "HD003",
            Self::Interrupted => "HD130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "HD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// A configuration value that was rejected before any scan work started.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The digest name is not on the supported allow-list.
    #[error("Unsupported hash algorithm '{name}' (supported: {supported})")]
    UnsupportedAlgorithm {
        /// Name that was requested
        name: String,
        /// Comma-separated list of accepted names
        supported: String,
    },

    /// The I/O pool needs at least one worker.
    #[error("io_threads must be at least 1")]
    ZeroIoThreads,

    /// An extension filter entry was empty (e.g. `--ext ,mp4`).
    #[error("Empty extension in extension filter")]
    EmptyExtension,

    /// The memory-map threshold must be positive.
    #[error("mmap_threshold must be greater than zero")]
    ZeroMmapThreshold,
}
