//! Skeleton voxel degree and node classification.
//!
//! The degree of a skeleton voxel is the number of skeleton voxels among its
//! 26 neighbors. Degree 1 marks a free end, degree 2 a strand interior and
//! degree > 2 a junction (node).

use tracing::debug;

use crate::convolve::convolve_same;
use crate::error::LigamentResult;
use crate::grid::{BoolGrid, DegreeGrid, Grid3};

/// Degree above which a skeleton voxel is a node.
pub const NODE_DEGREE_THRESHOLD: u8 = 2;

/// The 3x3x3 full-connectivity kernel with the center removed.
pub fn neighbor_kernel() -> Grid3<f64> {
    let mut kernel = Grid3::new([3, 3, 3], 1.0);
    kernel[[1, 1, 1]] = 0.0;
    kernel
}

/// Count skeleton neighbors of every skeleton voxel.
///
/// Non-skeleton voxels always report 0. The convolution result is rounded to
/// the nearest integer before the cast so floating-point drift cannot turn a
/// count of 3 into 2.
pub fn count_neighbors(skeleton: &BoolGrid) -> LigamentResult<DegreeGrid> {
    let conv = convolve_same(&skeleton.to_real(), &neighbor_kernel());
    let degrees = conv.zip_map(skeleton, |&c, &on| if on { c.round() as u8 } else { 0 })?;

    debug!(
        skeleton_voxels = skeleton.count(),
        max_degree = degrees.iter().copied().max().unwrap_or(0),
        "Counted skeleton neighbors"
    );
    Ok(degrees)
}

/// Mark junction voxels (degree > 2).
pub fn find_nodes(degrees: &DegreeGrid) -> BoolGrid {
    degrees.map(|&d| d > NODE_DEGREE_THRESHOLD)
}

/// Mark free-end voxels (degree exactly 1).
pub fn find_end_points(degrees: &DegreeGrid) -> BoolGrid {
    degrees.map(|&d| d == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(dims: [usize; 3], len: usize) -> BoolGrid {
        let mut grid = Grid3::new(dims, false);
        for x in 0..len {
            grid[[x + 2, 5, 5]] = true;
        }
        grid
    }

    #[test]
    fn test_line_degrees() {
        let skeleton = line([20, 10, 10], 10);
        let degrees = count_neighbors(&skeleton).unwrap();

        assert_eq!(degrees[[2, 5, 5]], 1);
        assert_eq!(degrees[[11, 5, 5]], 1);
        for x in 3..11 {
            assert_eq!(degrees[[x, 5, 5]], 2);
        }
        // Off-skeleton voxels next to the line stay zero.
        assert_eq!(degrees[[5, 6, 5]], 0);
        assert!(!find_nodes(&degrees).any());
        assert_eq!(find_end_points(&degrees).count(), 2);
    }

    #[test]
    fn test_full_neighborhood() {
        let skeleton = Grid3::new([3, 3, 3], true);
        let degrees = count_neighbors(&skeleton).unwrap();
        assert_eq!(degrees[[1, 1, 1]], 26);
        assert_eq!(degrees[[0, 0, 0]], 7);
        assert_eq!(degrees[[1, 0, 0]], 11);
    }

    #[test]
    fn test_junction_is_node() {
        // Y shape: two diagonal arms and one straight arm, pairwise non-adjacent.
        let mut skeleton = Grid3::new([9, 9, 3], false);
        skeleton[[4, 4, 1]] = true;
        for i in 1..=3 {
            skeleton[[4 + i, 4 + i, 1]] = true;
            skeleton[[4 - i, 4 + i, 1]] = true;
            skeleton[[4, 4 - i, 1]] = true;
        }

        let degrees = count_neighbors(&skeleton).unwrap();
        assert_eq!(degrees[[4, 4, 1]], 3);
        let nodes = find_nodes(&degrees);
        assert_eq!(nodes.count(), 1);
        assert!(nodes[[4, 4, 1]]);
    }

    #[test]
    fn test_isolated_voxel_has_degree_zero() {
        let mut skeleton = Grid3::new([3, 3, 3], false);
        skeleton[[1, 1, 1]] = true;
        let degrees = count_neighbors(&skeleton).unwrap();
        assert!(degrees.iter().all(|&d| d == 0));
    }
}
