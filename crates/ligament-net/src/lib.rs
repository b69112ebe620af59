//! Ligament network extraction and measurement for binary 3D volumes.
//!
//! This crate turns a binary volume of a porous or ligament microstructure
//! (nanoporous metals, foams) into a network of nodes and ligaments and
//! measures their diameters and lengths.
//!
//! # Features
//!
//! - **Grids**: Fixed-rank typed voxel grids ([`BoolGrid`], [`DegreeGrid`], [`LabelGrid`], [`DistanceGrid`])
//! - **Topology**: Neighbor counting, node classification, ligament labeling, terminal filtering
//! - **Measurement**: Border-trimmed diameters per category, voxel-count ligament lengths
//! - **Node volumes**: Ball reconstruction from a memoized [`SphereTable`], or iterative dilation
//! - **Runs**: [`VolumeModel`] with single-flight background runs, progress and cancellation
//! - **I/O**: Image slice stacks, extended XYZ point files, text and JSON reports
//!
//! Thinning and the distance transform are collaborators supplied through the
//! [`Skeletonizer`] and [`DistanceTransform`] traits. The `ligament-skel`
//! crate provides the standard implementations.
//!
//! # Units
//!
//! Grids are in voxels. Every exported measurement is multiplied by the
//! volume's pixel size, so lists are in whatever physical unit the pixel size
//! was given in.
//!
//! # Axis Order
//!
//! Grids are indexed `[x, y, z]` with x-fastest storage. Measurement lists
//! and label ids follow x-major order (x outermost, z innermost).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ligament_net::io::{LoadOptions, load_volume};
//! use ligament_net::{NoOpObserver, Pipeline, PrethinnedSkeleton, VolumeModel};
//! # use ligament_net::{BoolGrid, DistanceGrid, DistanceTransform, ProgressObserver, StageError};
//! # struct Edt;
//! # impl DistanceTransform for Edt {
//! #     fn distance_transform(&self, v: &BoolGrid, _: &dyn ProgressObserver) -> Result<DistanceGrid, StageError> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! let ingested = load_volume("slices/", &LoadOptions::default()).unwrap();
//! let pipeline = Pipeline::new(Arc::new(PrethinnedSkeleton), Arc::new(Edt));
//! let model = VolumeModel::with_volume(ingested.volume, pipeline);
//!
//! let analysis = model.calculate().unwrap().wait().unwrap();
//! print!("{}", analysis.measurements.to_report());
//! ```

mod error;
mod grid;
mod model;
mod pipeline;
mod results;
mod volume;
pub mod tracing_ext;

pub mod config;
pub mod convolve;
pub mod io;
pub mod labels;
pub mod metrics;
pub mod neighbors;
pub mod node_mask;
pub mod progress;
pub mod sphere;
pub mod stages;
pub mod terminal;

// Re-export core types at crate root
pub use error::{ErrorCode, LigamentError, LigamentResult, RecoverySuggestion};
pub use grid::{BoolGrid, DegreeGrid, DistanceGrid, Grid3, LabelGrid, NEIGHBOR_OFFSETS_26};
pub use volume::{FALLBACK_PIXEL_SIZE, Volume};

// Pipeline and model
pub use model::{AnalysisTask, CompletionCallback, TaskStatus, VolumeModel};
pub use pipeline::{COMPLETE_PHASE, NetworkAnalysis, Pipeline, analyze};
pub use results::{Measurements, Statistic, Summary};

// Collaborator seams and progress
pub use progress::{
    CallbackObserver, CancellationToken, NoOpObserver, Progress, ProgressCallback,
    ProgressObserver, ProgressTracker,
};
pub use stages::{DistanceTransform, PipelineStage, PrethinnedSkeleton, Skeletonizer, StageError};

// Parameters
pub use config::{AnalysisParams, SkeletonParams};
pub use metrics::{DiameterParams, MeasurementCategory, NOISE_THRESHOLD, TRIM_FACTOR};
pub use node_mask::{NodeMaskParams, NodeMaskStrategy};

// Commonly used stage functions
pub use labels::{Connectivity, Labeling, label_components, label_ligaments};
pub use neighbors::{count_neighbors, find_nodes};
pub use sphere::SphereTable;
pub use terminal::{TerminalSplit, remove_terminal_ligaments};
