//! Collaborator seams of the pipeline.
//!
//! Thinning and the distance transform are supplied from outside the core
//! through [`Skeletonizer`] and [`DistanceTransform`]. The `ligament-skel`
//! crate provides the standard implementations.

use crate::grid::{BoolGrid, DistanceGrid};
use crate::progress::ProgressObserver;

/// Boxed error returned by collaborator stages.
pub type StageError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Named stages of one analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Skeletonize,
    DistanceTransform,
    CountNeighbors,
    FindNodes,
    LabelLigaments,
    FilterTerminal,
    MeasureLengths,
    MeasureDiameters,
    ReconstructNodeMask,
    Aggregate,
}

impl PipelineStage {
    /// Status text reported to progress observers.
    pub fn phase(&self) -> &'static str {
        match self {
            PipelineStage::Skeletonize => "Skeletonizing...",
            PipelineStage::DistanceTransform => "Calculating distance transform...",
            PipelineStage::CountNeighbors => "Counting pixel neighbors...",
            PipelineStage::FindNodes => "Finding nodes...",
            PipelineStage::LabelLigaments => "Separating ligaments...",
            PipelineStage::FilterTerminal => "Finding terminal ligaments...",
            PipelineStage::MeasureLengths => "Calculating length...",
            PipelineStage::MeasureDiameters => "Calculating diameter...",
            PipelineStage::ReconstructNodeMask => "Finding node mask...",
            PipelineStage::Aggregate => "Collecting results...",
        }
    }

    /// Overall progress percentage at which the stage starts.
    pub fn percent(&self) -> u8 {
        match self {
            PipelineStage::Skeletonize => 1,
            PipelineStage::DistanceTransform => 20,
            PipelineStage::CountNeighbors => 25,
            PipelineStage::FindNodes => 30,
            PipelineStage::LabelLigaments => 40,
            PipelineStage::FilterTerminal => 50,
            PipelineStage::MeasureLengths => 60,
            PipelineStage::MeasureDiameters => 70,
            PipelineStage::ReconstructNodeMask => 85,
            PipelineStage::Aggregate => 95,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Skeletonize => "skeletonization",
            PipelineStage::DistanceTransform => "distance transform",
            PipelineStage::CountNeighbors => "neighbor counting",
            PipelineStage::FindNodes => "node classification",
            PipelineStage::LabelLigaments => "ligament labeling",
            PipelineStage::FilterTerminal => "terminal filtering",
            PipelineStage::MeasureLengths => "length measurement",
            PipelineStage::MeasureDiameters => "diameter measurement",
            PipelineStage::ReconstructNodeMask => "node mask reconstruction",
            PipelineStage::Aggregate => "result aggregation",
        };
        write!(f, "{}", name)
    }
}

/// Topological thinning of a binary volume.
///
/// Implementations return a same-shape grid whose true voxels form a
/// connectivity-preserving, 1-voxel-wide skeleton of the input.
pub trait Skeletonizer: Send + Sync {
    /// Thin `volume` to its skeleton.
    fn skeletonize(
        &self,
        volume: &BoolGrid,
        observer: &dyn ProgressObserver,
    ) -> Result<BoolGrid, StageError>;
}

/// Euclidean distance to the nearest background voxel.
///
/// Implementations return a same-shape grid in voxel units, zero on background.
pub trait DistanceTransform: Send + Sync {
    /// Compute the distance field of `volume`.
    fn distance_transform(
        &self,
        volume: &BoolGrid,
        observer: &dyn ProgressObserver,
    ) -> Result<DistanceGrid, StageError>;
}

/// Skeletonizer for inputs that are already thinned.
///
/// Returns the volume unchanged. Useful when the skeleton was produced by
/// another tool and only the network analysis is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrethinnedSkeleton;

impl Skeletonizer for PrethinnedSkeleton {
    fn skeletonize(
        &self,
        volume: &BoolGrid,
        _observer: &dyn ProgressObserver,
    ) -> Result<BoolGrid, StageError> {
        Ok(volume.clone())
    }
}
