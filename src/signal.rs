//! Ctrl+C handling.
//!
//! A [`ShutdownHandler`] wraps a shared `AtomicBool` that the Ctrl+C hook
//! sets. It implements [`CancelCheck`], so the binary hands it to the
//! duplicate finder as the cancellation predicate; the finder then stops
//! scheduling work, flushes pending cache writes and returns an empty result.
//!
//! ```rust,no_run
//! use hashdupe::signal::install_handler;
//! use hashdupe::progress::CancelCheck;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//! if handler.is_cancelled() {
//!     return;
//! }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::progress::CancelCheck;

/// Shared shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` once Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The underlying flag, for code that wants a raw `AtomicBool`.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelCheck for ShutdownHandler {
    fn is_cancelled(&self) -> bool {
        self.is_shutdown_requested()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process Ctrl+C hook and return its handler.
///
/// The hook can only be registered once per process. Later calls (for
/// example from tests calling `run_app` repeatedly) get the existing handler
/// back with its flag reset. If another library already owns the hook, an
/// unhooked handler is returned that still honors
/// [`request_shutdown`](ShutdownHandler::request_shutdown).
///
/// # Errors
///
/// Currently always succeeds; the `Result` leaves room for platforms where
/// installation is a hard requirement.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing in-flight work...");
        let _ = std::io::stderr().flush();
    });

    match installed {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(_) => {
            let fallback = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
            fallback.reset();
            Ok(fallback)
        }
    }
}
