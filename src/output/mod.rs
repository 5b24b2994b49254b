//! Output formatters for scan results.
//!
//! - [`text`]: terminal report
//! - [`json`]: machine-readable document for scripting
//!
//! # Example
//!
//! ```no_run
//! use hashdupe::duplicates::{DuplicateFinder, ScanHooks};
//! use hashdupe::error::ExitCode;
//! use hashdupe::output::JsonOutput;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, summary) = finder.find_duplicates(Path::new("."), &ScanHooks::default()).unwrap();
//!
//! let output = JsonOutput::new(&groups, &summary, &finder.cache_stats(), ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::{write_cache_report, TextOutput};
