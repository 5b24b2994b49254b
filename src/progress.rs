//! Progress reporting and cancellation hooks.
//!
//! The pipeline reports `(processed, total)` pairs through a [`ProgressSink`]
//! and polls a [`CancelCheck`] between units of work. Both are plain traits
//! with blanket impls for closures, so callers can pass `|done, total| ...`
//! or `|| flag.load(..)` directly.
//!
//! [`Progress`] is the indicatif-backed reporter used by the binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Receiver of `(processed, total)` updates.
///
/// Within one phase the `processed` values a sink observes never decrease.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, processed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, processed: usize, total: usize) {
        self(processed, total);
    }
}

/// Polled cancellation predicate.
pub trait CancelCheck: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelCheck for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

impl CancelCheck for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// Number of items between two progress callbacks.
///
/// Aims for roughly `divisions` evenly spaced updates; small totals report
/// every item.
#[must_use]
pub fn report_interval(total: usize, divisions: usize) -> usize {
    if divisions > 0 && total > divisions {
        (total / divisions).max(1)
    } else {
        1
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    /// Work done, in units
    processed: usize,
    /// Units counted at the last callback
    last_units: Option<usize>,
    /// Item count sent with the last callback
    last_reported: Option<usize>,
}

/// Thread-safe progress counter that throttles and orders callbacks.
///
/// Counting and reporting happen under one lock, so concurrent workers can
/// call [`advance`](Self::advance) and the sink still sees a non-decreasing
/// sequence.
///
/// Work is counted in units. An item is done after `units_per_item` units,
/// which lets a two-stage pass credit half an item per stage while the sink
/// still sees `(items_done, total_items)`.
pub struct ProgressTracker {
    sink: Option<Arc<dyn ProgressSink>>,
    total: usize,
    units_per_item: usize,
    interval: usize,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    /// Tracker where one unit is one item.
    #[must_use]
    pub fn new(sink: Option<Arc<dyn ProgressSink>>, total: usize, divisions: usize) -> Self {
        Self::with_units(sink, total, 1, divisions)
    }

    /// Tracker where each of the `total` items takes `units_per_item` units.
    #[must_use]
    pub fn with_units(
        sink: Option<Arc<dyn ProgressSink>>,
        total: usize,
        units_per_item: usize,
        divisions: usize,
    ) -> Self {
        let units_per_item = units_per_item.max(1);
        Self {
            sink,
            total,
            units_per_item,
            interval: report_interval(total * units_per_item, divisions),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Seed the counter with fully decided items (e.g. cache hits) and emit
    /// the initial report.
    pub fn start(&self, items_done: usize) {
        let mut state = self.lock();
        state.processed = items_done.min(self.total) * self.units_per_item;
        if self.total > 0 {
            self.report(&mut state);
        }
    }

    /// Count `units` more units of work.
    pub fn advance(&self, units: usize) {
        if units == 0 {
            return;
        }
        let total_units = self.total_units();
        let mut state = self.lock();
        state.processed = (state.processed + units).min(total_units);
        let since_last = state.processed - state.last_units.unwrap_or(0);
        if since_last >= self.interval || state.processed == total_units {
            self.report(&mut state);
        }
    }

    /// Emit the final count if it has not been reported yet.
    pub fn finish(&self) {
        let mut state = self.lock();
        if self.total > 0 {
            self.report(&mut state);
        }
    }

    /// Items fully decided so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.lock().processed / self.units_per_item
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    fn total_units(&self) -> usize {
        self.total * self.units_per_item
    }

    fn report(&self, state: &mut TrackerState) {
        state.last_units = Some(state.processed);
        let items = state.processed / self.units_per_item;
        if state.last_reported == Some(items) {
            return;
        }
        state.last_reported = Some(items);
        if let Some(sink) = &self.sink {
            sink.on_progress(items, self.total);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        // A poisoned counter is still a valid counter.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total", &self.total)
            .field("units_per_item", &self.units_per_item)
            .field("interval", &self.interval)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Which pipeline phase a bar belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Hashing,
}

/// Progress reporter using indicatif.
///
/// Hands out one [`PhaseBar`] per phase; each bar is created lazily on its
/// first update, when the total is known.
pub struct Progress {
    multi: MultiProgress,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter. With `quiet`, sinks are no-ops.
    ///
    /// ```
    /// use hashdupe::progress::{Phase, Progress, ProgressSink};
    ///
    /// let progress = Progress::new(true);
    /// let bar = progress.phase(Phase::Hashing);
    /// bar.on_progress(1, 2);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            quiet,
        }
    }

    /// A sink that drives a bar for `phase`.
    #[must_use]
    pub fn phase(&self, phase: Phase) -> Arc<PhaseBar> {
        Arc::new(PhaseBar {
            multi: self.multi.clone(),
            phase,
            quiet: self.quiet,
            bar: Mutex::new(None),
        })
    }
}

/// Progress bar for a single phase.
pub struct PhaseBar {
    multi: MultiProgress,
    phase: Phase,
    quiet: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl PhaseBar {
    fn style(&self) -> ProgressStyle {
        let template = match self.phase {
            Phase::Scanning => {
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}"
            }
            Phase::Hashing => {
                "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg} {per_sec} (ETA: {eta})"
            }
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    fn labels(&self) -> (&'static str, &'static str) {
        match self.phase {
            Phase::Scanning => ("Scanning files", "Scan complete"),
            Phase::Hashing => ("Hashing candidates", "Hashing complete"),
        }
    }
}

impl ProgressSink for PhaseBar {
    fn on_progress(&self, processed: usize, total: usize) {
        if self.quiet {
            return;
        }
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        let (running, done) = self.labels();
        let bar = guard.get_or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(self.style());
            pb.set_message(running);
            pb
        });
        bar.set_length(total as u64);
        bar.set_position(processed as u64);
        if processed >= total {
            bar.finish_with_message(done);
        }
    }
}
