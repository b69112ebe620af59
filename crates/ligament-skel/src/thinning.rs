//! Directional topological thinning (Lee, Kashyap & Chu, 1994).
//!
//! Each pass sweeps the six face directions. For one direction, every
//! foreground voxel whose neighbor in that direction is background, that is
//! not a strand end and that is simple becomes a candidate. Candidates are
//! found in parallel against a frozen grid, then re-checked and removed one
//! by one in raster order, so that deleting a whole border layer at once
//! cannot disconnect the object. Thinning stops after a pass that removes
//! nothing.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use ligament_net::tracing_ext::OperationTimer;
use ligament_net::{
    BoolGrid, PipelineStage, ProgressObserver, ProgressTracker, SkeletonParams, Skeletonizer,
    StageError,
};

use crate::error::{SkeletonError, SkeletonResult};
use crate::topology::{BORDER_DIRECTIONS, is_endpoint, is_simple, neighborhood};

/// Outcome of one thinning run.
#[derive(Debug, Clone)]
pub struct ThinningStats {
    /// Passes over all six directions.
    pub passes: usize,
    /// Voxels removed.
    pub removed: usize,
    /// Whether the pass limit stopped thinning early.
    pub truncated: bool,
}

/// Lee-style 3D thinning.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeeThinning {
    max_passes: usize,
}

impl LeeThinning {
    /// Thin until no voxel is removable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Thinning configured from analysis parameters.
    pub fn from_params(params: &SkeletonParams) -> Self {
        Self {
            max_passes: params.max_passes,
        }
    }

    /// Stop after `max_passes` passes; 0 means unbounded.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Configured pass limit.
    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Thin `volume`, returning the skeleton and run statistics.
    pub fn thin(
        &self,
        volume: &BoolGrid,
        observer: &dyn ProgressObserver,
    ) -> SkeletonResult<(BoolGrid, ThinningStats)> {
        if volume.is_empty() {
            return Err(SkeletonError::empty_grid(volume.dims()));
        }
        let _timer = OperationTimer::with_dims("thin", volume.dims());

        let mut grid = volume.clone();
        let foreground = grid.count();
        let stage = PipelineStage::Skeletonize;
        let tracker = ProgressTracker::new(
            foreground as u64,
            stage.percent(),
            PipelineStage::DistanceTransform.percent() - 1,
        );

        let mut stats = ThinningStats {
            passes: 0,
            removed: 0,
            truncated: false,
        };

        loop {
            if self.max_passes > 0 && stats.passes == self.max_passes {
                stats.truncated = true;
                warn!(
                    max_passes = self.max_passes,
                    "Thinning stopped at the pass limit"
                );
                break;
            }
            stats.passes += 1;

            let mut removed_this_pass = 0;
            for direction in BORDER_DIRECTIONS {
                let candidates = border_candidates(&grid, direction);
                removed_this_pass += remove_sequentially(&mut grid, &candidates);
            }
            stats.removed += removed_this_pass;

            tracker.set(stats.removed as u64);
            tracker.maybe_report(observer, stage.phase());
            debug!(
                pass = stats.passes,
                removed = removed_this_pass,
                remaining = foreground - stats.removed,
                "Thinning pass"
            );

            if removed_this_pass == 0 {
                break;
            }
        }

        info!(
            passes = stats.passes,
            removed = stats.removed,
            skeleton_voxels = foreground - stats.removed,
            "Thinning complete"
        );
        Ok((grid, stats))
    }
}

impl Skeletonizer for LeeThinning {
    fn skeletonize(
        &self,
        volume: &BoolGrid,
        observer: &dyn ProgressObserver,
    ) -> Result<BoolGrid, StageError> {
        let (skeleton, _) = self.thin(volume, observer)?;
        Ok(skeleton)
    }
}

/// Deletable border voxels facing `direction`, in raster order.
fn border_candidates(grid: &BoolGrid, direction: [isize; 3]) -> Vec<usize> {
    (0..grid.len())
        .into_par_iter()
        .filter(|&idx| {
            let [x, y, z] = grid.delinearize(idx);
            if !grid[[x, y, z]] {
                return false;
            }
            let outside = grid.get_signed(
                x as isize + direction[0],
                y as isize + direction[1],
                z as isize + direction[2],
            );
            if let Some(true) = outside {
                return false;
            }
            let bits = neighborhood(grid, x, y, z);
            !is_endpoint(bits) && is_simple(bits)
        })
        .collect()
}

/// Re-check and remove candidates one at a time; returns the number removed.
fn remove_sequentially(grid: &mut BoolGrid, candidates: &[usize]) -> usize {
    let mut removed = 0;
    for &idx in candidates {
        let [x, y, z] = grid.delinearize(idx);
        let bits = neighborhood(grid, x, y, z);
        if !is_endpoint(bits) && is_simple(bits) {
            grid[[x, y, z]] = false;
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligament_net::{Connectivity, Grid3, NoOpObserver, label_components};

    fn thin(grid: &BoolGrid) -> (BoolGrid, ThinningStats) {
        LeeThinning::new().thin(grid, &NoOpObserver).unwrap()
    }

    #[test]
    fn test_line_is_kept() {
        let mut grid: BoolGrid = Grid3::new([12, 5, 5], false);
        for x in 1..11 {
            grid[[x, 2, 2]] = true;
        }
        let (skeleton, stats) = thin(&grid);
        assert_eq!(skeleton, grid);
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.passes, 1);
    }

    #[test]
    fn test_single_voxel_is_kept() {
        let mut grid: BoolGrid = Grid3::new([3, 3, 3], false);
        grid[[1, 1, 1]] = true;
        let (skeleton, _) = thin(&grid);
        assert_eq!(skeleton.count(), 1);
    }

    #[test]
    fn test_bar_thins_to_one_voxel_wide_line() {
        let grid: BoolGrid = Grid3::from_fn([20, 7, 7], |x, y, z| {
            (2..18).contains(&x) && (2..5).contains(&y) && (2..5).contains(&z)
        });
        let (skeleton, stats) = thin(&grid);
        assert!(stats.removed > 0);
        assert!(skeleton.count() < grid.count() / 4);
        assert!(
            skeleton
                .coords_x_major()
                .filter(|&p| skeleton[p])
                .all(|p| grid[p])
        );

        // The strand still spans the bar.
        for x in 5..15 {
            let section = (0..7)
                .flat_map(|y| (0..7).map(move |z| (y, z)))
                .filter(|&(y, z)| skeleton[[x, y, z]])
                .count();
            assert!(section >= 1, "section {} is empty", x);
        }
        assert_eq!(label_components(&skeleton, Connectivity::Full).count, 1);
    }

    #[test]
    fn test_preserves_components() {
        let grid: BoolGrid = Grid3::from_fn([16, 8, 8], |x, y, z| {
            let a = (1..6).contains(&x) && (1..6).contains(&y) && (1..6).contains(&z);
            let b = (9..15).contains(&x) && (2..5).contains(&y) && (2..5).contains(&z);
            a || b
        });
        let (skeleton, _) = thin(&grid);
        assert_eq!(label_components(&skeleton, Connectivity::Full).count, 2);
    }

    #[test]
    fn test_pass_limit() {
        let grid: BoolGrid = Grid3::from_fn([16, 16, 16], |x, y, z| {
            (2..14).contains(&x) && (2..14).contains(&y) && (2..14).contains(&z)
        });
        let (_, stats) = LeeThinning::new()
            .with_max_passes(1)
            .thin(&grid, &NoOpObserver)
            .unwrap();
        assert_eq!(stats.passes, 1);
        assert!(stats.truncated);
    }

    #[test]
    fn test_from_params() {
        let params = SkeletonParams {
            prethinned: false,
            max_passes: 7,
        };
        assert_eq!(LeeThinning::from_params(&params).max_passes(), 7);
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        let grid: BoolGrid = Grid3::new([0, 3, 3], false);
        assert!(matches!(
            LeeThinning::new().thin(&grid, &NoOpObserver),
            Err(SkeletonError::EmptyGrid { .. })
        ));
    }
}
