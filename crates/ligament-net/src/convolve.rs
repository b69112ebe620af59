//! Sparse "same"-mode 3D convolution.
//!
//! Both the neighbor counter and the node mask reconstruction convolve a
//! mostly-empty indicator grid with a small kernel. The convolution is
//! evaluated in scatter form: every nonzero input voxel adds its weighted
//! kernel into the output, which costs `nnz(input) * nnz(kernel)` instead of
//! `len(input) * len(kernel)`.
//!
//! Output alignment follows the usual "same" convention: the output has the
//! input's shape and is the central part of the full convolution, offset by
//! `(k - 1) / 2` per axis. Positions outside the grid are treated as zero.

use crate::grid::Grid3;

/// Convolve `input` with `kernel`, returning a grid shaped like `input`.
pub fn convolve_same(input: &Grid3<f64>, kernel: &Grid3<f64>) -> Grid3<f64> {
    let dims = input.dims();
    let mut output = Grid3::new(dims, 0.0);
    if input.is_empty() || kernel.is_empty() {
        return output;
    }

    let kdims = kernel.dims();
    let center = [
        ((kdims[0] - 1) / 2) as isize,
        ((kdims[1] - 1) / 2) as isize,
        ((kdims[2] - 1) / 2) as isize,
    ];

    // Nonzero taps as (offset from center, weight).
    let taps: Vec<([isize; 3], f64)> = kernel
        .as_slice()
        .iter()
        .enumerate()
        .filter(|&(_, &w)| w != 0.0)
        .map(|(idx, &w)| {
            let [kx, ky, kz] = kernel.delinearize(idx);
            (
                [
                    kx as isize - center[0],
                    ky as isize - center[1],
                    kz as isize - center[2],
                ],
                w,
            )
        })
        .collect();

    for (idx, &value) in input.as_slice().iter().enumerate() {
        if value == 0.0 {
            continue;
        }
        let [x, y, z] = input.delinearize(idx);
        for &(offset, weight) in &taps {
            let ox = x as isize + offset[0];
            let oy = y as isize + offset[1];
            let oz = z as isize + offset[2];
            if ox < 0 || oy < 0 || oz < 0 {
                continue;
            }
            if let Some(out) = output.get_mut(ox as usize, oy as usize, oz as usize) {
                *out += value * weight;
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_impulse_reproduces_kernel() {
        let mut input = Grid3::new([5, 5, 5], 0.0);
        input[[2, 2, 2]] = 1.0;
        let kernel = Grid3::from_fn([3, 3, 3], |x, y, z| (x * 9 + y * 3 + z) as f64);

        let out = convolve_same(&input, &kernel);
        // Convolution flips the kernel relative to correlation.
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    assert_relative_eq!(out[[1 + x, 1 + y, 1 + z]], kernel[[x, y, z]]);
                }
            }
        }
        assert_relative_eq!(out[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_border_clipping() {
        let mut input = Grid3::new([3, 3, 3], 0.0);
        input[[0, 0, 0]] = 1.0;
        let kernel = Grid3::new([3, 3, 3], 1.0);

        let out = convolve_same(&input, &kernel);
        let total: f64 = out.iter().sum();
        // Only the 2x2x2 corner block of the kernel lands inside the grid.
        assert_relative_eq!(total, 8.0);
    }

    #[test]
    fn test_linearity() {
        let mut input = Grid3::new([4, 4, 4], 0.0);
        input[[1, 1, 1]] = 2.0;
        input[[2, 1, 1]] = 0.5;
        let kernel = Grid3::new([3, 3, 3], 1.0);

        let out = convolve_same(&input, &kernel);
        assert_relative_eq!(out[[1, 1, 1]], 2.5);
        assert_relative_eq!(out[[0, 0, 0]], 2.0);
        assert_relative_eq!(out[[3, 2, 2]], 0.5);
    }
}
