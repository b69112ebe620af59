//! Node volume reconstruction.
//!
//! Nodes are single skeleton voxels, but the junction they stand for fills a
//! roughly spherical region of the foreground. Two strategies rebuild that
//! region:
//!
//! - [`NodeMaskStrategy::SphereConvolution`] places a ball with the node's
//!   distance-field radius on every node voxel.
//! - [`NodeMaskStrategy::IterativeDilation`] grows the node set until each
//!   grown component leaks into the background, then freezes it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::convolve::convolve_same;
use crate::error::{LigamentError, LigamentResult};
use crate::grid::{BoolGrid, DistanceGrid, Grid3};
use crate::labels::{Connectivity, label_components};
use crate::sphere::SphereTable;
use crate::tracing_ext::log_perf_section;

/// Default upper bound on quantized node radii (in voxels).
pub const DEFAULT_MAX_RADIUS: u32 = 255;

/// Default iteration bound for [`NodeMaskStrategy::IterativeDilation`].
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

/// How node volumes are reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeMaskStrategy {
    /// Stamp a ball of the node's distance-field radius at every node.
    #[default]
    SphereConvolution,
    /// Dilate the node set until components reach the background.
    IterativeDilation { max_iterations: usize },
}

/// Parameters for node mask reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMaskParams {
    /// Run the reconstruction stage.
    pub enabled: bool,
    /// Reconstruction strategy.
    pub strategy: NodeMaskStrategy,
    /// Radii above this bound are clamped.
    pub max_radius: u32,
}

impl Default for NodeMaskParams {
    fn default() -> Self {
        Self {
            enabled: false,
            strategy: NodeMaskStrategy::SphereConvolution,
            max_radius: DEFAULT_MAX_RADIUS,
        }
    }
}

impl NodeMaskParams {
    /// Enabled with the sphere convolution strategy.
    pub fn sphere_convolution() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Enabled with the iterative dilation strategy.
    pub fn iterative_dilation() -> Self {
        Self {
            enabled: true,
            strategy: NodeMaskStrategy::IterativeDilation {
                max_iterations: DEFAULT_MAX_ITERATIONS,
            },
            ..Self::default()
        }
    }
}

/// Quantized node radii: `trunc(distance)` on node voxels, 0 elsewhere.
///
/// Returns the radius grid and the number of node voxels clamped to `max_radius`.
pub fn quantize_radii(
    nodes: &BoolGrid,
    distance: &DistanceGrid,
    max_radius: u32,
) -> LigamentResult<(Grid3<u32>, usize)> {
    let radii = nodes.zip_map(distance, |&on, &d| {
        if on && d > 0.0 {
            d.trunc().min(f64::from(u32::MAX)) as u32
        } else {
            0
        }
    })?;
    let clamped = radii.iter().filter(|&&r| r > max_radius).count();
    let radii = if clamped > 0 {
        radii.map(|&r| r.min(max_radius))
    } else {
        radii
    };
    Ok((radii, clamped))
}

/// Reconstruct node volumes with the configured strategy.
pub fn reconstruct_node_mask(
    volume: &BoolGrid,
    nodes: &BoolGrid,
    distance: &DistanceGrid,
    spheres: &SphereTable,
    params: &NodeMaskParams,
) -> LigamentResult<BoolGrid> {
    let mask = match params.strategy {
        NodeMaskStrategy::SphereConvolution => {
            sphere_node_mask(nodes, distance, spheres, params.max_radius)?
        }
        NodeMaskStrategy::IterativeDilation { max_iterations } => {
            dilation_node_mask(volume, nodes, max_iterations)?
        }
    };
    info!(
        strategy = ?params.strategy,
        node_mask_voxels = mask.count(),
        "Reconstructed node mask"
    );
    Ok(mask)
}

/// Union of balls centered on node voxels, sized by the distance field.
pub fn sphere_node_mask(
    nodes: &BoolGrid,
    distance: &DistanceGrid,
    spheres: &SphereTable,
    max_radius: u32,
) -> LigamentResult<BoolGrid> {
    let (radii, clamped) = quantize_radii(nodes, distance, max_radius)?;
    if clamped > 0 {
        warn!(
            clamped = clamped,
            max_radius = max_radius,
            "Node radii exceeded the bound and were clamped"
        );
    }

    let mut distinct: Vec<u32> = radii.iter().copied().filter(|&r| r > 0).collect();
    distinct.sort_unstable();
    distinct.dedup();
    debug!(distinct_radii = distinct.len(), "Quantized node radii");

    let mut mask: BoolGrid = Grid3::new(nodes.dims(), false);
    for radius in distinct {
        let _section = log_perf_section("stamp_radius");
        let indicator = radii.map(|&r| if r == radius { 1.0 } else { 0.0 });
        let kernel = spheres.get(radius).to_real();
        let stamped = convolve_same(&indicator, &kernel).map(|&v| v > 0.5);
        mask.union_with(&stamped)?;
    }
    Ok(mask)
}

/// One step of 6-connected binary dilation, clipped to the grid.
pub fn dilate_face(mask: &BoolGrid) -> BoolGrid {
    let face = Connectivity::Face.offsets();
    Grid3::from_fn(mask.dims(), |x, y, z| {
        mask[[x, y, z]]
            || face.iter().any(|d| {
                matches!(
                    mask.get_signed(x as isize + d[0], y as isize + d[1], z as isize + d[2]),
                    Some(true)
                )
            })
    })
}

/// Grow node components until they leak into the background.
///
/// Each iteration dilates the growing set and labels it with 26-connectivity.
/// A component containing any background voxel is moved to the output. The
/// result is restricted to the foreground.
pub fn dilation_node_mask(
    volume: &BoolGrid,
    nodes: &BoolGrid,
    max_iterations: usize,
) -> LigamentResult<BoolGrid> {
    if volume.dims() != nodes.dims() {
        return Err(LigamentError::shape_mismatch(volume.dims(), nodes.dims()));
    }

    let mut mask: BoolGrid = Grid3::new(nodes.dims(), false);
    let mut growing = nodes.clone();
    let mut iterations = 0;

    while growing.any() {
        if iterations == max_iterations {
            warn!(
                max_iterations = max_iterations,
                unfinished_voxels = growing.count(),
                "Node dilation hit the iteration bound; freezing remaining components"
            );
            mask.union_with(&growing)?;
            break;
        }
        iterations += 1;

        growing = dilate_face(&growing);
        let labeling = label_components(&growing, Connectivity::Full);

        // Component ids that reach outside the foreground.
        let mut leaks = vec![false; labeling.count as usize + 1];
        for (&id, &inside) in labeling.labels.iter().zip(volume.iter()) {
            if id != 0 && !inside {
                leaks[id as usize] = true;
            }
        }
        let frozen = labeling.labels.map(|&id| leaks[id as usize]);
        mask.union_with(&frozen)?;
        growing = growing.zip_map(&frozen, |&g, &f| g && !f)?;
    }

    debug!(iterations = iterations, "Node dilation finished");
    mask.zip_map(volume, |&m, &v| m && v)
}
