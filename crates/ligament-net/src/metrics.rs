//! Diameter and length measurements.
//!
//! # Diameters
//!
//! The local diameter at a mask voxel is twice its distance-field value. The
//! distance field under-estimates the true radius near the faces of the
//! sampled sub-volume, because structure continuing outside the grid is not
//! seen. Measurements within `trim_factor * floor(mean diameter)` voxels of
//! any face are therefore dropped, and values at or below `noise_threshold`
//! voxels (thinning noise, sub-resolution features) are discarded.
//!
//! # Lengths
//!
//! The length of a ligament is approximated by its voxel count. This is close
//! to the arclength only for roughly axis-aligned, low-curvature strands; a
//! diagonal strand of `n` voxels is `sqrt(2)` or `sqrt(3)` times longer than
//! its count suggests.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LigamentError, LigamentResult};
use crate::grid::{BoolGrid, DistanceGrid, LabelGrid};
use crate::labels::label_histogram;

/// Border trim as a multiple of the average diameter (in voxels).
pub const TRIM_FACTOR: usize = 2;

/// Local diameters at or below this many voxels are discarded.
pub const NOISE_THRESHOLD: f64 = 2.0;

/// Measurement list categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementCategory {
    AllDiameters,
    ConnectedDiameters,
    TerminalDiameters,
    NodeDiameters,
    Lengths,
    PercentTerminal,
}

impl std::fmt::Display for MeasurementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MeasurementCategory::AllDiameters => "ligament diameter",
            MeasurementCategory::ConnectedDiameters => "connected ligament diameter",
            MeasurementCategory::TerminalDiameters => "terminal ligament diameter",
            MeasurementCategory::NodeDiameters => "node diameter",
            MeasurementCategory::Lengths => "ligament length",
            MeasurementCategory::PercentTerminal => "terminal percentage",
        };
        write!(f, "{}", name)
    }
}

/// Parameters for diameter measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiameterParams {
    /// Border trim as a multiple of the floored average diameter.
    pub trim_factor: usize,
    /// Raw (voxel-unit) diameters at or below this value are discarded.
    pub noise_threshold: f64,
}

impl Default for DiameterParams {
    fn default() -> Self {
        Self {
            trim_factor: TRIM_FACTOR,
            noise_threshold: NOISE_THRESHOLD,
        }
    }
}

impl DiameterParams {
    /// Params that keep every positive measurement (no trim, no noise filter).
    pub fn untrimmed() -> Self {
        Self {
            trim_factor: 0,
            noise_threshold: 0.0,
        }
    }
}

/// Local diameter grid: `2 * distance` on mask voxels, 0 elsewhere.
pub fn local_diameters(mask: &BoolGrid, distance: &DistanceGrid) -> LigamentResult<DistanceGrid> {
    mask.zip_map(distance, |&on, &d| if on { d * 2.0 } else { 0.0 })
}

/// Border margin in voxels for a local diameter grid.
///
/// Returns `None` when no voxel has a positive diameter.
pub fn trim_margin(diameters: &DistanceGrid, trim_factor: usize) -> Option<usize> {
    let (sum, count) = diameters
        .iter()
        .filter(|&&d| d > 0.0)
        .fold((0.0, 0usize), |(s, c), &d| (s + d, c + 1));
    if count == 0 {
        return None;
    }
    let average = (sum / count as f64).floor() as usize;
    Some(trim_factor.saturating_mul(average))
}

/// Measure diameters of `mask` in physical units.
///
/// Returns measurements in x-major order. The list is empty when the mask has
/// no positive distance values or the border trim consumes the grid.
pub fn diameter(
    mask: &BoolGrid,
    distance: &DistanceGrid,
    pixel_size: f64,
    params: &DiameterParams,
) -> LigamentResult<Vec<f64>> {
    let local = local_diameters(mask, distance)?;
    let Some(margin) = trim_margin(&local, params.trim_factor) else {
        debug!("No positive diameters in mask");
        return Ok(Vec::new());
    };

    let cropped = local.crop(margin);
    let diameters: Vec<f64> = cropped
        .iter_x_major()
        .copied()
        .filter(|&d| d > params.noise_threshold)
        .map(|d| d * pixel_size)
        .collect();

    debug!(
        margin = margin,
        cropped_dims = ?cropped.dims(),
        measurements = diameters.len(),
        "Measured diameters"
    );
    Ok(diameters)
}

/// Ligament lengths in physical units, ordered by label id.
///
/// Each length is the voxel count of one label; ids without voxels are skipped.
pub fn lengths(labels: &LabelGrid, pixel_size: f64) -> Vec<f64> {
    let counts = label_histogram(labels);
    counts
        .iter()
        .skip(1)
        .filter(|&&c| c > 0)
        .map(|&c| c as f64 * pixel_size)
        .collect()
}

/// Restrict `labels` to the voxels of `mask`.
pub fn mask_labels(labels: &LabelGrid, mask: &BoolGrid) -> LigamentResult<LabelGrid> {
    labels.zip_map(mask, |&id, &on| if on { id } else { 0 })
}

/// Arithmetic mean of a measurement list.
pub fn mean(values: &[f64], category: MeasurementCategory) -> LigamentResult<f64> {
    if values.is_empty() {
        return Err(LigamentError::empty_diameter_set(category));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Share of terminal diameter measurements among all, in percent.
pub fn percent_terminal(terminal: &[f64], all: &[f64]) -> LigamentResult<f64> {
    if all.is_empty() {
        return Err(LigamentError::empty_diameter_set(
            MeasurementCategory::AllDiameters,
        ));
    }
    Ok(100.0 * terminal.len() as f64 / all.len() as f64)
}
