//! Exact Euclidean distance transform.
//!
//! Squared distances are computed with the separable lower-envelope algorithm
//! of Felzenszwalb & Huttenlocher (2012): one 1D transform along every x line,
//! then every y line, then every z line. Lines of one axis are independent and
//! run in parallel.

use rayon::prelude::*;
use tracing::{debug, info};

use ligament_net::tracing_ext::OperationTimer;
use ligament_net::{
    BoolGrid, DistanceGrid, DistanceTransform, PipelineStage, ProgressObserver, ProgressTracker,
    StageError,
};

use crate::error::{SkeletonError, SkeletonResult};

/// Stand-in for an infinite squared distance.
const FAR: f64 = 1e20;

/// Exact Euclidean distance to the nearest background voxel.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDistance;

impl EuclideanDistance {
    /// Distance field of `volume` in voxel units, 0 on background.
    pub fn compute(
        &self,
        volume: &BoolGrid,
        observer: &dyn ProgressObserver,
    ) -> SkeletonResult<DistanceGrid> {
        if volume.is_empty() {
            return Err(SkeletonError::empty_grid(volume.dims()));
        }
        if volume.count() == volume.len() {
            return Err(SkeletonError::no_background(volume.dims()));
        }
        let _timer = OperationTimer::with_dims("distance_transform", volume.dims());

        let stage = PipelineStage::DistanceTransform;
        let tracker = ProgressTracker::new(
            3,
            stage.percent(),
            PipelineStage::CountNeighbors.percent() - 1,
        );
        let [nx, ny, nz] = volume.dims();

        let mut field = volume.map(|&on| if on { FAR } else { 0.0 });
        let squared = field.as_mut_slice();

        // x lines are contiguous.
        squared.par_chunks_mut(nx).for_each(|line| {
            let mut scratch = Envelope::new(nx);
            scratch.transform(line);
        });
        tracker.increment();
        tracker.maybe_report(observer, stage.phase());

        // y lines are strided within one z plane.
        squared.par_chunks_mut(nx * ny).for_each(|plane| {
            let mut scratch = Envelope::new(ny);
            let mut line = vec![0.0; ny];
            for x in 0..nx {
                for (y, v) in line.iter_mut().enumerate() {
                    *v = plane[x + nx * y];
                }
                scratch.transform(&mut line);
                for (y, v) in line.iter().enumerate() {
                    plane[x + nx * y] = *v;
                }
            }
        });
        tracker.increment();
        tracker.maybe_report(observer, stage.phase());

        // z lines cross planes: transform into columns, then scatter back.
        let plane = nx * ny;
        let columns: Vec<Vec<f64>> = (0..plane)
            .into_par_iter()
            .map(|xy| {
                let mut scratch = Envelope::new(nz);
                let mut line: Vec<f64> = (0..nz).map(|z| squared[xy + plane * z]).collect();
                scratch.transform(&mut line);
                line
            })
            .collect();
        for (xy, column) in columns.into_iter().enumerate() {
            for (z, v) in column.into_iter().enumerate() {
                squared[xy + plane * z] = v;
            }
        }
        tracker.increment();
        tracker.maybe_report(observer, stage.phase());

        squared.par_iter_mut().for_each(|d| *d = d.sqrt());

        let max = field.iter().copied().fold(0.0, f64::max);
        debug!(max_distance = max, "Distance field extremes");
        info!(
            foreground = volume.count(),
            max_distance = max,
            "Distance transform complete"
        );
        Ok(field)
    }
}

impl DistanceTransform for EuclideanDistance {
    fn distance_transform(
        &self,
        volume: &BoolGrid,
        observer: &dyn ProgressObserver,
    ) -> Result<DistanceGrid, StageError> {
        Ok(self.compute(volume, observer)?)
    }
}

/// Reusable buffers for the 1D lower-envelope transform.
struct Envelope {
    /// Parabola vertices.
    vertices: Vec<usize>,
    /// Boundaries between parabolas.
    bounds: Vec<f64>,
    /// Copy of the input line.
    input: Vec<f64>,
}

impl Envelope {
    fn new(n: usize) -> Self {
        Self {
            vertices: vec![0; n],
            bounds: vec![0.0; n + 1],
            input: vec![0.0; n],
        }
    }

    /// Replace `line` with its 1D squared distance transform.
    fn transform(&mut self, line: &mut [f64]) {
        let n = line.len();
        if n == 0 {
            return;
        }
        self.input.clear();
        self.input.extend_from_slice(line);
        let f = &self.input;
        let v = &mut self.vertices;
        let z = &mut self.bounds;

        let mut k = 0usize;
        v[0] = 0;
        z[0] = f64::NEG_INFINITY;
        z[1] = f64::INFINITY;

        for q in 1..n {
            let mut s = intersection(f, q, v[k]);
            while s <= z[k] {
                // k > 0 here: z[0] is -inf.
                k -= 1;
                s = intersection(f, q, v[k]);
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = f64::INFINITY;
        }

        k = 0;
        for (q, out) in line.iter_mut().enumerate() {
            let qf = q as f64;
            while z[k + 1] < qf {
                k += 1;
            }
            let d = qf - v[k] as f64;
            *out = d * d + f[v[k]];
        }
    }
}

/// Position where the parabolas rooted at `q` and `p` meet.
#[inline]
fn intersection(f: &[f64], q: usize, p: usize) -> f64 {
    let qf = q as f64;
    let pf = p as f64;
    ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
}
