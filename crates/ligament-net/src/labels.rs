//! Connected-component labeling of voxel masks.
//!
//! Ligaments are the connected runs of degree-1 and degree-2 skeleton voxels
//! once junctions are removed. Components are found with a flood fill started
//! from each unvisited voxel in x-major raster order, so ids are deterministic
//! for a fixed input: id 1 is the component containing the first candidate
//! voxel met when scanning x outermost and z innermost.

use tracing::{debug, info};

use crate::grid::{BoolGrid, DegreeGrid, Grid3, LabelGrid};

/// Voxel adjacency used for labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Face neighbors only (6).
    Face,
    /// Face and edge neighbors (18).
    Edge,
    /// Face, edge and corner neighbors (26).
    #[default]
    Full,
}

impl Connectivity {
    /// Neighbor offsets for this connectivity.
    pub fn offsets(&self) -> Vec<[isize; 3]> {
        let max_nonzero = match self {
            Connectivity::Face => 1,
            Connectivity::Edge => 2,
            Connectivity::Full => 3,
        };
        crate::grid::NEIGHBOR_OFFSETS_26
            .iter()
            .copied()
            .filter(|d| d.iter().filter(|&&c| c != 0).count() <= max_nonzero)
            .collect()
    }
}

/// Result of connected component labeling.
#[derive(Debug, Clone, PartialEq)]
pub struct Labeling {
    /// Label grid; 0 outside the mask, ids `1..=count` inside.
    pub labels: LabelGrid,
    /// Number of components found.
    pub count: u32,
}

impl Labeling {
    /// Ids in use, ascending.
    pub fn ids(&self) -> impl Iterator<Item = u32> {
        1..=self.count
    }

    /// Voxel count per id; index 0 holds the unlabeled voxel count.
    pub fn histogram(&self) -> Vec<usize> {
        label_histogram(&self.labels)
    }
}

/// Voxel count per label id; index 0 counts unlabeled voxels.
pub fn label_histogram(labels: &LabelGrid) -> Vec<usize> {
    let max = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut counts = vec![0usize; max + 1];
    for &id in labels.iter() {
        counts[id as usize] += 1;
    }
    counts
}

/// Label the connected components of `mask`.
pub fn label_components(mask: &BoolGrid, connectivity: Connectivity) -> Labeling {
    let offsets = connectivity.offsets();
    let mut labels: LabelGrid = Grid3::zeros(mask.dims());
    let mut count = 0u32;
    let mut stack: Vec<[usize; 3]> = Vec::new();

    for start in mask.coords_x_major() {
        if !mask[start] || labels[start] != 0 {
            continue;
        }

        count += 1;
        labels[start] = count;
        stack.push(start);

        while let Some([x, y, z]) = stack.pop() {
            for d in &offsets {
                let nx = x as isize + d[0];
                let ny = y as isize + d[1];
                let nz = z as isize + d[2];
                if let Some(true) = mask.get_signed(nx, ny, nz) {
                    let n = [nx as usize, ny as usize, nz as usize];
                    if labels[n] == 0 {
                        labels[n] = count;
                        stack.push(n);
                    }
                }
            }
        }
    }

    debug!(
        components = count,
        connectivity = ?connectivity,
        "Labeled connected components"
    );

    Labeling { labels, count }
}

/// Label ligaments: 26-connected runs of degree-1 and degree-2 voxels.
///
/// Isolated voxels (degree 0) and junctions (degree > 2) stay 0.
pub fn label_ligaments(degrees: &DegreeGrid) -> Labeling {
    let candidates = degrees.map(|&d| d == 1 || d == 2);
    let labeling = label_components(&candidates, Connectivity::Full);
    info!(ligaments = labeling.count, "Separated ligaments");
    labeling
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_offsets() {
        assert_eq!(Connectivity::Face.offsets().len(), 6);
        assert_eq!(Connectivity::Edge.offsets().len(), 18);
        assert_eq!(Connectivity::Full.offsets().len(), 26);
    }

    #[test]
    fn test_diagonal_voxels_depend_on_connectivity() {
        let mut mask: BoolGrid = Grid3::new([3, 3, 3], false);
        mask[[0, 0, 0]] = true;
        mask[[1, 1, 1]] = true;

        assert_eq!(label_components(&mask, Connectivity::Full).count, 1);
        assert_eq!(label_components(&mask, Connectivity::Edge).count, 2);
        assert_eq!(label_components(&mask, Connectivity::Face).count, 2);
    }

    #[test]
    fn test_ids_follow_x_major_scan() {
        let mut mask: BoolGrid = Grid3::new([4, 4, 4], false);
        mask[[3, 0, 0]] = true; // first in storage order, last in x-major order
        mask[[0, 0, 3]] = true;

        let labeling = label_components(&mask, Connectivity::Full);
        assert_eq!(labeling.labels[[0, 0, 3]], 1);
        assert_eq!(labeling.labels[[3, 0, 0]], 2);
    }

    #[test]
    fn test_label_ligaments_excludes_nodes_and_isolated() {
        let mut degrees: DegreeGrid = Grid3::zeros([5, 1, 1]);
        degrees[[0, 0, 0]] = 1;
        degrees[[1, 0, 0]] = 3;
        degrees[[2, 0, 0]] = 2;
        degrees[[3, 0, 0]] = 1;

        let labeling = label_ligaments(&degrees);
        assert_eq!(labeling.count, 2);
        assert_eq!(labeling.labels[[1, 0, 0]], 0);
        assert_eq!(labeling.labels[[4, 0, 0]], 0);
        assert_eq!(labeling.labels[[2, 0, 0]], labeling.labels[[3, 0, 0]]);
        assert_ne!(labeling.labels[[0, 0, 0]], labeling.labels[[2, 0, 0]]);
    }

    #[test]
    fn test_histogram() {
        let labels = Grid3::from_vec([4, 1, 1], vec![0u32, 1, 1, 2]).unwrap();
        assert_eq!(label_histogram(&labels), vec![1, 2, 1]);
    }
}
