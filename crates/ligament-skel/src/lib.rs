//! Thinning and distance transform collaborators for `ligament-net`.
//!
//! - [`LeeThinning`]: directional topological thinning that keeps strand ends
//!   and the 26-connected component structure of the foreground
//! - [`EuclideanDistance`]: exact separable Euclidean distance transform
//!
//! Both implement the `ligament-net` collaborator traits, so they plug
//! straight into a [`Pipeline`]:
//!
//! ```no_run
//! use ligament_net::io::{LoadOptions, load_volume};
//! use ligament_net::{AnalysisParams, VolumeModel};
//!
//! let ingested = load_volume("slices/", &LoadOptions::default()).unwrap();
//! let pipeline = ligament_skel::standard_pipeline(AnalysisParams::default());
//! let model = VolumeModel::with_volume(ingested.volume, pipeline);
//! let analysis = model.calculate().unwrap().wait().unwrap();
//! println!("{} ligaments", analysis.ligament_count);
//! ```

mod distance;
mod error;
mod thinning;
pub mod topology;

use std::sync::Arc;

use ligament_net::{AnalysisParams, Pipeline};

pub use distance::EuclideanDistance;
pub use error::{SkeletonError, SkeletonErrorCode, SkeletonResult};
pub use thinning::{LeeThinning, ThinningStats};

/// A pipeline using [`LeeThinning`] and [`EuclideanDistance`].
///
/// The thinning pass limit is taken from `params.thinning`.
pub fn standard_pipeline(params: AnalysisParams) -> Pipeline {
    Pipeline::new(
        Arc::new(LeeThinning::from_params(&params.thinning)),
        Arc::new(EuclideanDistance),
    )
    .with_params(params)
}
