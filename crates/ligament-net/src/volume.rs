//! Binary input volumes.

use tracing::warn;

use crate::error::{LigamentError, LigamentResult};
use crate::grid::BoolGrid;

/// Pixel size used when the supplied one is unusable.
pub const FALLBACK_PIXEL_SIZE: f64 = 1.0;

/// A binary volume with an isotropic physical voxel size.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    grid: BoolGrid,
    pixel_size: f64,
}

impl Volume {
    /// Create a volume, rejecting empty grids and invalid pixel sizes.
    pub fn new(grid: BoolGrid, pixel_size: f64) -> LigamentResult<Self> {
        if grid.is_empty() {
            return Err(LigamentError::empty_volume(format!(
                "grid dimensions {:?}",
                grid.dims()
            )));
        }
        check_pixel_size(pixel_size)?;
        Ok(Self { grid, pixel_size })
    }

    /// Create a volume, substituting [`FALLBACK_PIXEL_SIZE`] for an invalid
    /// pixel size.
    ///
    /// The substitution is returned as a warning alongside the volume.
    pub fn with_fallback(
        grid: BoolGrid,
        pixel_size: f64,
    ) -> LigamentResult<(Self, Option<LigamentError>)> {
        match check_pixel_size(pixel_size) {
            Ok(()) => Ok((Self::new(grid, pixel_size)?, None)),
            Err(warning) => {
                warn!(
                    pixel_size = pixel_size,
                    fallback = FALLBACK_PIXEL_SIZE,
                    "Invalid pixel size, using fallback"
                );
                Ok((Self::new(grid, FALLBACK_PIXEL_SIZE)?, Some(warning)))
            }
        }
    }

    /// The voxel grid.
    pub fn grid(&self) -> &BoolGrid {
        &self.grid
    }

    /// Physical length of one voxel edge.
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Grid dimensions `[x, y, z]`.
    pub fn dims(&self) -> [usize; 3] {
        self.grid.dims()
    }

    /// Number of foreground voxels.
    pub fn foreground_voxels(&self) -> usize {
        self.grid.count()
    }

    /// Fraction of voxels in the foreground.
    pub fn foreground_fraction(&self) -> f64 {
        self.foreground_voxels() as f64 / self.grid.len() as f64
    }

    /// The volume with foreground and background swapped.
    pub fn inverted(&self) -> Self {
        Self {
            grid: self.grid.map(|&v| !v),
            pixel_size: self.pixel_size,
        }
    }

    /// Consume the volume, returning its grid.
    pub fn into_grid(self) -> BoolGrid {
        self.grid
    }
}

fn check_pixel_size(pixel_size: f64) -> LigamentResult<()> {
    if !pixel_size.is_finite() {
        return Err(LigamentError::invalid_pixel_size(
            pixel_size.to_string(),
            "not a finite number",
        ));
    }
    if pixel_size <= 0.0 {
        return Err(LigamentError::invalid_pixel_size(
            pixel_size.to_string(),
            "must be positive",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid3;

    #[test]
    fn test_new_validates() {
        let grid: BoolGrid = Grid3::new([2, 2, 2], true);
        assert!(Volume::new(grid.clone(), 0.5).is_ok());
        assert!(matches!(
            Volume::new(grid.clone(), 0.0),
            Err(LigamentError::InvalidPixelSize { .. })
        ));
        assert!(matches!(
            Volume::new(grid, f64::NAN),
            Err(LigamentError::InvalidPixelSize { .. })
        ));
        let empty: BoolGrid = Grid3::new([0, 4, 4], true);
        assert!(matches!(
            Volume::new(empty, 1.0),
            Err(LigamentError::EmptyVolume { .. })
        ));
    }

    #[test]
    fn test_fallback_returns_warning() {
        let grid: BoolGrid = Grid3::new([2, 2, 2], true);
        let (volume, warning) = Volume::with_fallback(grid.clone(), -3.0).unwrap();
        assert_eq!(volume.pixel_size(), FALLBACK_PIXEL_SIZE);
        assert!(warning.unwrap().is_recoverable());

        let (volume, warning) = Volume::with_fallback(grid, 2.0).unwrap();
        assert_eq!(volume.pixel_size(), 2.0);
        assert!(warning.is_none());
    }

    #[test]
    fn test_inverted_and_fraction() {
        let mut grid: BoolGrid = Grid3::new([2, 2, 1], false);
        grid[[0, 0, 0]] = true;
        let volume = Volume::new(grid, 1.0).unwrap();
        assert_eq!(volume.foreground_voxels(), 1);
        assert!((volume.foreground_fraction() - 0.25).abs() < 1e-12);
        assert_eq!(volume.inverted().foreground_voxels(), 3);
    }
}
