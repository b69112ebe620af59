//! Tracing extensions for the analysis pipeline.
//!
//! Structured logging and timing for analysis stages, built on the `tracing`
//! ecosystem. Initialize a subscriber in your application to see the output:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // Set RUST_LOG=ligament_net=debug for detailed output
//! ```
//!
//! # Log Levels
//!
//! - **WARN**: Recovered conditions (pixel size fallback, clamped radii)
//! - **INFO**: Stage summaries and timing
//! - **DEBUG**: Intermediate counts
//! - **TRACE**: Per-section timing

use std::time::Instant;

use tracing::{Span, debug, info, trace};

use crate::grid::BoolGrid;
use crate::results::Measurements;

/// A performance timer that logs duration on drop.
///
/// ```rust,ignore
/// use ligament_net::tracing_ext::OperationTimer;
///
/// fn expensive_stage() {
///     let _timer = OperationTimer::new("expensive_stage");
///     // ... do work ...
/// } // Timer logs duration when dropped
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("ligament_operation", operation = name);
        debug!(target: "ligament_net::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer carrying the grid dimensions as span fields.
    pub fn with_dims(name: &'static str, dims: [usize; 3]) -> Self {
        let span = tracing::info_span!(
            "ligament_operation",
            operation = name,
            nx = dims[0],
            ny = dims[1],
            nz = dims[2]
        );
        debug!(
            target: "ligament_net::timing",
            operation = name,
            dims = ?dims,
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Get the elapsed time.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Get the span for this timer.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        info!(
            target: "ligament_net::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", elapsed_ms),
            "Operation completed"
        );
    }
}

/// Log the occupancy of a mask at debug level.
pub fn log_grid_stats(grid: &BoolGrid, context: &str) {
    let voxels = grid.count();
    let fraction = if grid.is_empty() {
        0.0
    } else {
        voxels as f64 / grid.len() as f64
    };
    debug!(
        target: "ligament_net::grid_state",
        context = context,
        dims = ?grid.dims(),
        voxels = voxels,
        fraction = format!("{:.4}", fraction),
        "Grid state"
    );
}

/// Log progress of a stage.
pub fn log_stage_progress(phase: &str, percent: u8) {
    debug!(
        target: "ligament_net::progress",
        phase = phase,
        percent = percent,
        "Progress update"
    );
}

/// Log the measurement counts of a finished run.
pub fn log_measurements(measurements: &Measurements) {
    info!(
        target: "ligament_net::measure",
        all_diameters = measurements.all_diameters.len(),
        connected_diameters = measurements.connected_diameters.len(),
        terminal_diameters = measurements.terminal_diameters.len(),
        node_diameters = measurements.node_diameters.len(),
        lengths = measurements.lengths.len(),
        "Measurements collected"
    );
}

/// Log a performance-critical section.
///
/// Returns a guard that logs when dropped.
#[must_use]
pub fn log_perf_section(name: &'static str) -> impl Drop {
    struct PerfGuard {
        name: &'static str,
        start: Instant,
    }
    impl Drop for PerfGuard {
        fn drop(&mut self) {
            let elapsed = self.start.elapsed();
            trace!(
                target: "ligament_net::perf",
                section = self.name,
                elapsed_us = elapsed.as_micros(),
                "Performance section completed"
            );
        }
    }
    PerfGuard {
        name,
        start: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid3;

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::with_dims("test_operation", [2, 3, 4]);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_log_helpers_do_not_panic() {
        let grid: BoolGrid = Grid3::new([0, 0, 0], false);
        log_grid_stats(&grid, "empty");
        log_stage_progress("phase", 10);
        let _guard = log_perf_section("section");
    }
}
