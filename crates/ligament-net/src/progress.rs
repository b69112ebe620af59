//! Progress reporting and cancellation for long-running analysis stages.
//!
//! This module provides:
//! - The [`ProgressObserver`] seam the pipeline reports through
//! - A no-op observer for headless use and a closure-backed observer
//! - [`ProgressTracker`] for mapping inner-loop progress onto a stage's share
//!   of the overall percentage
//! - [`CancellationToken`] checked between stages
//!
//! # Example
//!
//! ```
//! use ligament_net::progress::{CallbackObserver, ProgressCallback, ProgressObserver};
//!
//! let callback: ProgressCallback = Box::new(|progress| {
//!     println!("{}% {}", progress.percent, progress.phase);
//! });
//! let observer = CallbackObserver::new(callback);
//! observer.on_progress("Skeletonizing...", 1);
//! ```

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress information passed to callbacks.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Human-readable description of the current phase.
    pub phase: String,

    /// Overall completion, 0 to 100.
    pub percent: u8,

    /// Elapsed time since the observer was created.
    pub elapsed: Duration,
}

impl Progress {
    /// Create a new progress report.
    pub fn new(phase: impl Into<String>, percent: u8) -> Self {
        Self {
            phase: phase.into(),
            percent: percent.min(100),
            elapsed: Duration::ZERO,
        }
    }

    /// Get progress as a fraction (0.0 to 1.0).
    #[inline]
    pub fn fraction(&self) -> f64 {
        f64::from(self.percent) / 100.0
    }

    /// Check if the run is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

/// Callback function for progress reporting.
pub type ProgressCallback = Box<dyn Fn(&Progress) + Send + Sync>;

/// Receives progress notifications from the pipeline.
///
/// Called synchronously from whichever worker is running the stage, so
/// implementations must be cheap and thread-safe.
pub trait ProgressObserver: Send + Sync {
    /// Report that `phase` is running and the run is `percent` complete.
    fn on_progress(&self, phase: &str, percent: u8);
}

/// An observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ProgressObserver for NoOpObserver {
    #[inline]
    fn on_progress(&self, _phase: &str, _percent: u8) {}
}

/// An observer that forwards to a [`ProgressCallback`].
pub struct CallbackObserver {
    callback: ProgressCallback,
    start_time: Instant,
}

impl CallbackObserver {
    /// Create a new callback observer.
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback,
            start_time: Instant::now(),
        }
    }
}

impl ProgressObserver for CallbackObserver {
    fn on_progress(&self, phase: &str, percent: u8) {
        let progress = Progress {
            phase: phase.to_string(),
            percent: percent.min(100),
            elapsed: self.start_time.elapsed(),
        };
        (self.callback)(&progress);
    }
}

impl<T: ProgressObserver + ?Sized> ProgressObserver for Arc<T> {
    fn on_progress(&self, phase: &str, percent: u8) {
        (**self).on_progress(phase, percent)
    }
}

/// Cooperative cancellation flag shared between a task handle and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A thread-safe tracker mapping inner-loop steps onto a percentage range.
///
/// Stages that run for a long time (thinning passes, distance transform
/// sweeps) own a slice `[start, end]` of the overall percentage. The tracker
/// converts `current / total` into that slice and throttles observer calls.
#[derive(Debug)]
pub struct ProgressTracker {
    current: AtomicU64,
    total: u64,
    start_percent: u8,
    end_percent: u8,
    start_time: Instant,
    last_callback_time: Mutex<Instant>,
    callback_interval: Duration,
}

impl ProgressTracker {
    /// Create a tracker for `total` steps reporting within `[start, end]` percent.
    pub fn new(total: u64, start_percent: u8, end_percent: u8) -> Self {
        Self {
            current: AtomicU64::new(0),
            total,
            start_percent: start_percent.min(100),
            end_percent: end_percent.clamp(start_percent.min(100), 100),
            start_time: Instant::now(),
            last_callback_time: Mutex::new(Instant::now()),
            callback_interval: Duration::from_millis(100),
        }
    }

    /// Create a tracker with a custom callback interval.
    pub fn with_interval(total: u64, start_percent: u8, end_percent: u8, interval: Duration) -> Self {
        let mut tracker = Self::new(total, start_percent, end_percent);
        tracker.callback_interval = interval;
        tracker
    }

    /// Increment progress by one.
    #[inline]
    pub fn increment(&self) {
        self.current.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the current progress value.
    #[inline]
    pub fn set(&self, value: u64) {
        self.current.store(value, Ordering::Relaxed);
    }

    /// Get the current progress value.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    /// Get the total count.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Get elapsed time.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Overall percentage corresponding to the current step.
    pub fn percent(&self) -> u8 {
        let fraction = if self.total == 0 {
            0.0
        } else {
            (self.current().min(self.total) as f64) / (self.total as f64)
        };
        let span = f64::from(self.end_percent - self.start_percent);
        self.start_percent + (fraction * span).round() as u8
    }

    /// Notify `observer` if enough time has passed since the last call.
    pub fn maybe_report(&self, observer: &dyn ProgressObserver, phase: &str) {
        let now = Instant::now();
        {
            let mut last = match self.last_callback_time.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if now.duration_since(*last) < self.callback_interval {
                return;
            }
            *last = now;
        }
        observer.on_progress(phase, self.percent());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_progress_fraction() {
        let p = Progress::new("test", 50);
        assert!((p.fraction() - 0.5).abs() < 1e-10);
        assert!(!p.is_complete());
        assert!(Progress::new("done", 120).is_complete());
        assert_eq!(Progress::new("clamped", 120).percent, 100);
    }

    #[test]
    fn test_callback_observer() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let callback: ProgressCallback = Box::new(move |p| {
            assert!(p.percent <= 100);
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let observer = CallbackObserver::new(callback);
        observer.on_progress("a", 10);
        observer.on_progress("b", 200);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_noop_observer() {
        NoOpObserver.on_progress("anything", 50);
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_tracker_maps_into_range() {
        let tracker = ProgressTracker::new(10, 20, 40);
        assert_eq!(tracker.percent(), 20);
        tracker.set(5);
        assert_eq!(tracker.percent(), 30);
        tracker.set(10);
        assert_eq!(tracker.percent(), 40);
        tracker.set(50);
        assert_eq!(tracker.percent(), 40);
    }

    #[test]
    fn test_tracker_throttles() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let observer = CallbackObserver::new(Box::new(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let eager = ProgressTracker::with_interval(4, 0, 100, Duration::ZERO);
        for i in 0..4 {
            eager.set(i);
            eager.maybe_report(&observer, "eager");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        let lazy = ProgressTracker::with_interval(4, 0, 100, Duration::from_secs(3600));
        lazy.maybe_report(&observer, "lazy");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
