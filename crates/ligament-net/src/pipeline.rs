//! The network extraction and measurement pipeline.
//!
//! [`Pipeline::run`] turns a [`Volume`] into a [`NetworkAnalysis`]:
//!
//! 1. Thinning and the distance transform run concurrently (`rayon::join`)
//! 2. Neighbor counting and node classification on the skeleton
//! 3. Ligament labeling and terminal filtering
//! 4. Length and diameter measurement per category
//! 5. Optional node mask reconstruction
//! 6. Aggregation into [`Measurements`]
//!
//! Cancellation is checked before every stage. A failing collaborator aborts
//! the run with [`LigamentError::ExternalStageFailure`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ligament_net::{
//!     AnalysisParams, CancellationToken, Grid3, NoOpObserver, Pipeline, PrethinnedSkeleton,
//!     SphereTable, Volume,
//! };
//! # use ligament_net::{BoolGrid, DistanceGrid, DistanceTransform, ProgressObserver, StageError};
//! # struct Flat;
//! # impl DistanceTransform for Flat {
//! #     fn distance_transform(&self, v: &BoolGrid, _: &dyn ProgressObserver) -> Result<DistanceGrid, StageError> {
//! #         Ok(v.map(|&on| if on { 1.0 } else { 0.0 }))
//! #     }
//! # }
//!
//! let mut grid = Grid3::new([20, 5, 5], false);
//! for x in 5..15 {
//!     grid[[x, 2, 2]] = true;
//! }
//! let volume = Volume::new(grid, 0.5).unwrap();
//!
//! let pipeline = Pipeline::new(Arc::new(PrethinnedSkeleton), Arc::new(Flat))
//!     .with_params(AnalysisParams::prethinned());
//! let analysis = pipeline
//!     .run(&volume, &SphereTable::new(), &NoOpObserver, &CancellationToken::new())
//!     .unwrap();
//! assert_eq!(analysis.ligament_count, 1);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::AnalysisParams;
use crate::error::{LigamentError, LigamentResult};
use crate::grid::{BoolGrid, DegreeGrid, DistanceGrid, LabelGrid};
use crate::labels::label_ligaments;
use crate::metrics::{diameter, lengths, mask_labels};
use crate::neighbors::{count_neighbors, find_nodes};
use crate::node_mask::reconstruct_node_mask;
use crate::progress::{CancellationToken, ProgressObserver};
use crate::results::Measurements;
use crate::sphere::SphereTable;
use crate::stages::{DistanceTransform, PipelineStage, PrethinnedSkeleton, Skeletonizer};
use crate::terminal::{TerminalSplit, remove_terminal_ligaments};
use crate::tracing_ext::{OperationTimer, log_grid_stats, log_measurements, log_stage_progress};
use crate::volume::Volume;

/// Phase text reported when a run completes.
pub const COMPLETE_PHASE: &str = "Done";

/// Every derived grid and measurement of one run.
#[derive(Debug, Clone)]
pub struct NetworkAnalysis {
    /// Thinned skeleton.
    pub skeleton: BoolGrid,
    /// Distance to background, in voxels.
    pub distance: DistanceGrid,
    /// Skeleton neighbor counts.
    pub degrees: DegreeGrid,
    /// Junction voxels.
    pub nodes: BoolGrid,
    /// Ligament ids.
    pub labels: LabelGrid,
    /// Number of ligaments.
    pub ligament_count: u32,
    /// Connected and terminal skeleton parts.
    pub terminal: TerminalSplit,
    /// Reconstructed node volumes, when enabled.
    pub node_mask: Option<BoolGrid>,
    /// Measurement lists and summary.
    pub measurements: Measurements,
    /// Pixel size the measurements were scaled by.
    pub pixel_size: f64,
    /// Stages that ran, in order.
    pub stages: Vec<PipelineStage>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl NetworkAnalysis {
    /// Number of node voxels.
    pub fn node_count(&self) -> usize {
        self.nodes.count()
    }

    /// Number of terminal ligaments.
    pub fn terminal_count(&self) -> usize {
        self.terminal.terminal_ids.len()
    }
}

/// Analysis pipeline with its thinning and distance collaborators.
#[derive(Clone)]
pub struct Pipeline {
    skeletonizer: Arc<dyn Skeletonizer>,
    distance: Arc<dyn DistanceTransform>,
    params: AnalysisParams,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline with default parameters.
    pub fn new(skeletonizer: Arc<dyn Skeletonizer>, distance: Arc<dyn DistanceTransform>) -> Self {
        Self {
            skeletonizer,
            distance,
            params: AnalysisParams::default(),
        }
    }

    /// Replace the analysis parameters.
    pub fn with_params(mut self, params: AnalysisParams) -> Self {
        self.params = params;
        self
    }

    /// Current analysis parameters.
    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Run every stage on `volume`.
    pub fn run(
        &self,
        volume: &Volume,
        spheres: &SphereTable,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> LigamentResult<NetworkAnalysis> {
        let _timer = OperationTimer::with_dims("analyze", volume.dims());
        let start = Instant::now();
        let grid = volume.grid();
        let pixel_size = volume.pixel_size();
        let mut stages = Vec::with_capacity(10);
        log_grid_stats(grid, "input volume");

        // Thinning and distance transform.
        enter(PipelineStage::Skeletonize, observer, cancel, &mut stages)?;
        let skeletonizer: &dyn Skeletonizer = if self.params.thinning.prethinned {
            &PrethinnedSkeleton
        } else {
            self.skeletonizer.as_ref()
        };
        let (skeleton, distance) = rayon::join(
            || skeletonizer.skeletonize(grid, observer),
            || self.distance.distance_transform(grid, observer),
        );
        let skeleton =
            skeleton.map_err(|e| LigamentError::stage_failure(PipelineStage::Skeletonize, e))?;
        check_dims(grid.dims(), skeleton.dims())?;
        log_grid_stats(&skeleton, "skeleton");

        // Both collaborators report concurrently; the transform's phase entry follows the join.
        enter(PipelineStage::DistanceTransform, observer, cancel, &mut stages)?;
        let distance = distance
            .map_err(|e| LigamentError::stage_failure(PipelineStage::DistanceTransform, e))?;
        check_dims(grid.dims(), distance.dims())?;

        enter(PipelineStage::CountNeighbors, observer, cancel, &mut stages)?;
        let degrees = count_neighbors(&skeleton)?;

        enter(PipelineStage::FindNodes, observer, cancel, &mut stages)?;
        let nodes = find_nodes(&degrees);

        enter(PipelineStage::LabelLigaments, observer, cancel, &mut stages)?;
        let labeling = label_ligaments(&degrees);

        enter(PipelineStage::FilterTerminal, observer, cancel, &mut stages)?;
        let terminal = remove_terminal_ligaments(&labeling.labels, &degrees)?;

        enter(PipelineStage::MeasureLengths, observer, cancel, &mut stages)?;
        let connected_labels = mask_labels(&labeling.labels, &terminal.connected)?;
        let connected_lengths = lengths(&connected_labels, pixel_size);
        let all_lengths = lengths(&labeling.labels, pixel_size);

        enter(PipelineStage::MeasureDiameters, observer, cancel, &mut stages)?;
        let p = &self.params.diameter;
        let all_diameters = diameter(&skeleton, &distance, pixel_size, p)?;
        let terminal_diameters = diameter(&terminal.terminal, &distance, pixel_size, p)?;
        let node_diameters = diameter(&nodes, &distance, pixel_size, p)?;
        let connected_diameters = diameter(&terminal.connected, &distance, pixel_size, p)?;

        let node_mask = if self.params.node_mask.enabled {
            enter(PipelineStage::ReconstructNodeMask, observer, cancel, &mut stages)?;
            Some(reconstruct_node_mask(
                grid,
                &nodes,
                &distance,
                spheres,
                &self.params.node_mask,
            )?)
        } else {
            debug!("Node mask reconstruction disabled");
            None
        };

        enter(PipelineStage::Aggregate, observer, cancel, &mut stages)?;
        let measurements = Measurements::new(
            all_diameters,
            connected_diameters,
            terminal_diameters,
            node_diameters,
            connected_lengths,
            all_lengths,
        );
        log_measurements(&measurements);

        info!(
            voxels = grid.count(),
            skeleton_voxels = skeleton.count(),
            nodes = nodes.count(),
            ligaments = labeling.count,
            terminal_ligaments = terminal.terminal_ids.len(),
            "Analysis complete"
        );
        observer.on_progress(COMPLETE_PHASE, 100);

        Ok(NetworkAnalysis {
            skeleton,
            distance,
            degrees,
            nodes,
            labels: labeling.labels,
            ligament_count: labeling.count,
            terminal,
            node_mask,
            measurements,
            pixel_size,
            stages,
            elapsed: start.elapsed(),
        })
    }
}

/// Run the pipeline once with explicit collaborators.
pub fn analyze(
    volume: &Volume,
    skeletonizer: Arc<dyn Skeletonizer>,
    distance: Arc<dyn DistanceTransform>,
    params: &AnalysisParams,
    spheres: &SphereTable,
    observer: &dyn ProgressObserver,
) -> LigamentResult<NetworkAnalysis> {
    Pipeline::new(skeletonizer, distance)
        .with_params(*params)
        .run(volume, spheres, observer, &CancellationToken::new())
}

fn enter(
    stage: PipelineStage,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
    stages: &mut Vec<PipelineStage>,
) -> LigamentResult<()> {
    if cancel.is_cancelled() {
        info!(stage = %stage, "Analysis cancelled");
        return Err(LigamentError::cancelled(stage.to_string()));
    }
    log_stage_progress(stage.phase(), stage.percent());
    observer.on_progress(stage.phase(), stage.percent());
    stages.push(stage);
    Ok(())
}

fn check_dims(expected: [usize; 3], actual: [usize; 3]) -> LigamentResult<()> {
    if expected != actual {
        return Err(LigamentError::shape_mismatch(expected, actual));
    }
    Ok(())
}
