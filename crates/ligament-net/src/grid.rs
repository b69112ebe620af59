//! Fixed-rank 3D voxel grids.
//!
//! Every derived quantity of the analysis lives in a [`Grid3`] with an explicit
//! element type: [`BoolGrid`] for masks, [`DegreeGrid`] for neighbor counts,
//! [`LabelGrid`] for ligament ids and [`DistanceGrid`] for the distance field.
//!
//! Storage is x-fastest (`x + y * nx + z * nx * ny`). Indexing with `[x, y, z]`
//! panics out of bounds; [`Grid3::get`] returns `None` instead.

use rayon::prelude::*;

use crate::error::{LigamentError, LigamentResult};

/// Boolean mask grid.
pub type BoolGrid = Grid3<bool>;
/// Neighbor count grid (0–26).
pub type DegreeGrid = Grid3<u8>;
/// Ligament label grid (0 = excluded).
pub type LabelGrid = Grid3<u32>;
/// Real-valued distance grid.
pub type DistanceGrid = Grid3<f64>;

/// Offsets of the 26 neighbors of a voxel, in x-major raster order.
pub const NEIGHBOR_OFFSETS_26: [[isize; 3]; 26] = {
    let mut offsets = [[0isize; 3]; 26];
    let mut i = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    offsets[i] = [dx, dy, dz];
                    i += 1;
                }
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    offsets
};

/// Dense 3D grid with dimensions `[x, y, z]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid3<T> {
    dims: [usize; 3],
    data: Vec<T>,
}

impl<T: Clone> Grid3<T> {
    /// Create a grid filled with `value`.
    pub fn new(dims: [usize; 3], value: T) -> Self {
        Self {
            dims,
            data: vec![value; dims[0] * dims[1] * dims[2]],
        }
    }
}

impl<T: Clone + Default> Grid3<T> {
    /// Create a grid filled with `T::default()`.
    pub fn zeros(dims: [usize; 3]) -> Self {
        Self::new(dims, T::default())
    }
}

impl<T> Grid3<T> {
    /// Wrap existing x-fastest data.
    pub fn from_vec(dims: [usize; 3], data: Vec<T>) -> LigamentResult<Self> {
        let expected = dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]))
            .ok_or_else(|| LigamentError::empty_volume(format!("grid {:?} overflows", dims)))?;
        if data.len() != expected {
            return Err(LigamentError::ShapeMismatch {
                expected: dims,
                actual: [data.len(), 1, 1],
            });
        }
        Ok(Self { dims, data })
    }

    /// Build a grid by evaluating `f` at every coordinate.
    pub fn from_fn(dims: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    data.push(f(x, y, z));
                }
            }
        }
        Self { dims, data }
    }

    /// Grid dimensions `[x, y, z]`.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of voxels.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the grid has no voxels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Convert 3D grid coordinates to linear index.
    #[inline]
    pub fn linearize(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.dims[0] + z * self.dims[0] * self.dims[1]
    }

    /// Convert linear index to 3D grid coordinates.
    #[inline]
    pub fn delinearize(&self, idx: usize) -> [usize; 3] {
        let plane = self.dims[0] * self.dims[1];
        let z = idx / plane;
        let rem = idx % plane;
        [rem % self.dims[0], rem / self.dims[0], z]
    }

    /// Whether a coordinate lies inside the grid.
    #[inline]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.dims[0] && y < self.dims[1] && z < self.dims[2]
    }

    /// Bounds-checked read.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        if self.contains(x, y, z) {
            Some(&self.data[self.linearize(x, y, z)])
        } else {
            None
        }
    }

    /// Bounds-checked mutable access.
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> Option<&mut T> {
        if self.contains(x, y, z) {
            let idx = self.linearize(x, y, z);
            Some(&mut self.data[idx])
        } else {
            None
        }
    }

    /// Read at a signed coordinate; out-of-grid positions yield `None`.
    #[inline]
    pub fn get_signed(&self, x: isize, y: isize, z: isize) -> Option<&T> {
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        self.get(x as usize, y as usize, z as usize)
    }

    /// In-grid coordinates of the 26 neighbors of `(x, y, z)`.
    pub fn neighbors_26(&self, x: usize, y: usize, z: usize) -> impl Iterator<Item = [usize; 3]> + '_ {
        NEIGHBOR_OFFSETS_26.iter().filter_map(move |d| {
            let nx = x as isize + d[0];
            let ny = y as isize + d[1];
            let nz = z as isize + d[2];
            if nx < 0 || ny < 0 || nz < 0 {
                return None;
            }
            let (nx, ny, nz) = (nx as usize, ny as usize, nz as usize);
            self.contains(nx, ny, nz).then_some([nx, ny, nz])
        })
    }

    /// Raw x-fastest storage.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable raw storage.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the grid, returning its storage.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Iterate over values in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Apply `f` to every voxel.
    pub fn map<U>(&self, f: impl Fn(&T) -> U + Sync + Send) -> Grid3<U>
    where
        T: Sync,
        U: Send,
    {
        Grid3 {
            dims: self.dims,
            data: self.data.par_iter().map(f).collect(),
        }
    }

    /// Combine two same-shape grids voxel by voxel.
    pub fn zip_map<U, V>(
        &self,
        other: &Grid3<U>,
        f: impl Fn(&T, &U) -> V + Sync + Send,
    ) -> LigamentResult<Grid3<V>>
    where
        T: Sync,
        U: Sync,
        V: Send,
    {
        if self.dims != other.dims {
            return Err(LigamentError::shape_mismatch(self.dims, other.dims));
        }
        Ok(Grid3 {
            dims: self.dims,
            data: self
                .data
                .par_iter()
                .zip(other.data.par_iter())
                .map(|(a, b)| f(a, b))
                .collect(),
        })
    }

    /// Values in x-major order (x outermost, z innermost).
    ///
    /// This is the flattening order used for every exported measurement list.
    pub fn iter_x_major(&self) -> impl Iterator<Item = &T> + '_ {
        let [nx, ny, nz] = self.dims;
        (0..nx).flat_map(move |x| {
            (0..ny).flat_map(move |y| (0..nz).map(move |z| &self.data[self.linearize(x, y, z)]))
        })
    }

    /// Coordinates in x-major order (x outermost, z innermost).
    pub fn coords_x_major(&self) -> impl Iterator<Item = [usize; 3]> {
        let [nx, ny, nz] = self.dims;
        (0..nx).flat_map(move |x| (0..ny).flat_map(move |y| (0..nz).map(move |z| [x, y, z])))
    }
}

impl<T: Clone> Grid3<T> {
    /// Remove `margin` voxels from every face.
    ///
    /// Returns an empty grid when the margin consumes an axis.
    pub fn crop(&self, margin: usize) -> Grid3<T> {
        let [nx, ny, nz] = self.dims;
        if margin == 0 {
            return self.clone();
        }
        let shrink = |n: usize| n.saturating_sub(margin.saturating_mul(2));
        let dims = [shrink(nx), shrink(ny), shrink(nz)];
        if dims.contains(&0) {
            return Grid3 {
                dims: [0, 0, 0],
                data: Vec::new(),
            };
        }
        Grid3::from_fn(dims, |x, y, z| {
            self.data[self.linearize(x + margin, y + margin, z + margin)].clone()
        })
    }
}

impl Grid3<bool> {
    /// Number of true voxels.
    pub fn count(&self) -> usize {
        self.data.par_iter().filter(|&&v| v).count()
    }

    /// Whether any voxel is true.
    pub fn any(&self) -> bool {
        self.data.par_iter().any(|&v| v)
    }

    /// Voxel-wise OR in place.
    pub fn union_with(&mut self, other: &BoolGrid) -> LigamentResult<()> {
        if self.dims != other.dims {
            return Err(LigamentError::shape_mismatch(self.dims, other.dims));
        }
        self.data
            .par_iter_mut()
            .zip(other.data.par_iter())
            .for_each(|(a, &b)| *a |= b);
        Ok(())
    }

    /// Convert to a 0/1 real grid.
    pub fn to_real(&self) -> Grid3<f64> {
        self.map(|&v| if v { 1.0 } else { 0.0 })
    }
}

impl<T> std::ops::Index<[usize; 3]> for Grid3<T> {
    type Output = T;

    #[inline]
    fn index(&self, [x, y, z]: [usize; 3]) -> &T {
        assert!(
            self.contains(x, y, z),
            "voxel ({}, {}, {}) outside grid {:?}",
            x,
            y,
            z,
            self.dims
        );
        &self.data[self.linearize(x, y, z)]
    }
}

impl<T> std::ops::IndexMut<[usize; 3]> for Grid3<T> {
    #[inline]
    fn index_mut(&mut self, [x, y, z]: [usize; 3]) -> &mut T {
        assert!(
            self.contains(x, y, z),
            "voxel ({}, {}, {}) outside grid {:?}",
            x,
            y,
            z,
            self.dims
        );
        let idx = self.linearize(x, y, z);
        &mut self.data[idx]
    }
}
