//! Volume ingestion and mask export.
//!
//! Supported inputs:
//!
//! - **Slice stacks**: a directory of 2D images (PNG, TIFF, BMP), sorted by
//!   file name. Each image is one z plane; image columns are x and rows are y.
//!   A pixel is foreground when its luminance is non-zero.
//! - **Extended XYZ** atomistic point files. The `Properties=` key on the
//!   comment line locates the `pos` columns. Positions are scaled by a lattice
//!   factor, rounded, shifted to the origin and rasterized; every atom then
//!   covers a 2x2x2 voxel block.
//!
//! Per-axis pixel sizes are parsed from text. When all three are valid the
//! volume is resampled to the largest of them; otherwise the volume is kept
//! as loaded with pixel size 1 and the parse failure is returned as a warning.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageReader};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{LigamentError, LigamentResult};
use crate::grid::{BoolGrid, Grid3};
use crate::volume::{FALLBACK_PIXEL_SIZE, Volume};

/// Default factor applied to XYZ positions before rounding to voxels.
pub const DEFAULT_LATTICE_SCALE: f64 = 0.407;

/// Upper bound on the voxel count of a rasterized point cloud.
pub const MAX_RASTER_VOXELS: u128 = 1 << 30;

/// File extensions read as slice images (lowercase).
pub const SLICE_EXTENSIONS: &[&str] = &["png", "tif", "tiff", "bmp"];

/// File extensions read as extended XYZ (lowercase).
pub const XYZ_EXTENSIONS: &[&str] = &["xyz", "extxyz"];

/// Options for [`load_volume`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Swap foreground and background after loading.
    pub invert: bool,
    /// Raw per-axis pixel sizes `[x, y, z]`, as entered by the user.
    pub pixel_sizes: Option<[String; 3]>,
    /// Scale factor for XYZ positions.
    pub lattice_scale: f64,
    /// Keep at most this many voxels along each axis, from the origin.
    pub max_extent: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            invert: false,
            pixel_sizes: None,
            lattice_scale: DEFAULT_LATTICE_SCALE,
            max_extent: None,
        }
    }
}

/// A loaded volume with the recoverable problems met while loading it.
#[derive(Debug)]
pub struct Ingested {
    pub volume: Volume,
    pub warnings: Vec<LigamentError>,
}

/// Load a volume from a slice directory or an XYZ file.
pub fn load_volume(path: impl AsRef<Path>, options: &LoadOptions) -> LigamentResult<Ingested> {
    let path = path.as_ref();
    let mut grid = if path.is_dir() {
        read_slice_stack(path)?
    } else {
        match lowercase_extension(path).as_deref() {
            Some(ext) if XYZ_EXTENSIONS.contains(&ext) => read_xyz(path, options.lattice_scale)?,
            ext => {
                return Err(LigamentError::UnsupportedFormat {
                    extension: ext.map(str::to_string),
                });
            }
        }
    };

    if let Some(extent) = options.max_extent {
        grid = truncate_extent(&grid, extent);
    }

    let mut warnings = Vec::new();
    let (grid, pixel_size) = match &options.pixel_sizes {
        Some(raw) => match parse_pixel_sizes(raw) {
            Ok(sizes) => resample_isotropic(&grid, sizes)?,
            Err(warning) => {
                warn!(error = %warning, "Pixel sizes not usable; no scaling and pixel size is 1");
                warnings.push(warning);
                (grid, FALLBACK_PIXEL_SIZE)
            }
        },
        None => (grid, FALLBACK_PIXEL_SIZE),
    };

    let volume = Volume::new(grid, pixel_size)?;
    let volume = if options.invert {
        volume.inverted()
    } else {
        volume
    };

    info!(
        path = %path.display(),
        dims = ?volume.dims(),
        pixel_size = volume.pixel_size(),
        foreground = volume.foreground_voxels(),
        "Loaded volume"
    );
    Ok(Ingested { volume, warnings })
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Parse one pixel size; it must be a positive finite number.
pub fn parse_pixel_size(text: &str) -> LigamentResult<f64> {
    let trimmed = text.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| LigamentError::invalid_pixel_size(trimmed, "not a number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(LigamentError::invalid_pixel_size(
            trimmed,
            "must be a positive finite number",
        ));
    }
    Ok(value)
}

/// Parse `[x, y, z]` pixel sizes.
pub fn parse_pixel_sizes(raw: &[String; 3]) -> LigamentResult<[f64; 3]> {
    Ok([
        parse_pixel_size(&raw[0])?,
        parse_pixel_size(&raw[1])?,
        parse_pixel_size(&raw[2])?,
    ])
}

/// Keep the first `extent` voxels along each axis.
pub fn truncate_extent(grid: &BoolGrid, extent: usize) -> BoolGrid {
    let [nx, ny, nz] = grid.dims();
    let dims = [nx.min(extent), ny.min(extent), nz.min(extent)];
    if dims == grid.dims() {
        return grid.clone();
    }
    debug!(from = ?grid.dims(), to = ?dims, "Truncated volume extent");
    Grid3::from_fn(dims, |x, y, z| grid[[x, y, z]])
}

// =========================================================================
// Slice stacks
// =========================================================================

/// Sorted slice image paths in `dir`.
pub fn slice_paths(dir: &Path) -> LigamentResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| LigamentError::IoRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LigamentError::IoRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_slice = path.is_file()
            && lowercase_extension(&path).is_some_and(|ext| SLICE_EXTENSIONS.contains(&ext.as_str()));
        if is_slice {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Read a directory of slice images into a volume.
pub fn read_slice_stack(dir: &Path) -> LigamentResult<BoolGrid> {
    let paths = slice_paths(dir)?;
    if paths.is_empty() {
        return Err(LigamentError::empty_volume(format!(
            "no slice images in {}",
            dir.display()
        )));
    }

    // Decoding is independent per slice.
    let slices: Vec<(u32, u32, Vec<bool>)> = paths
        .par_iter()
        .map(|path| read_slice(path))
        .collect::<LigamentResult<_>>()?;

    let (width, height) = (slices[0].0, slices[0].1);
    for (path, (w, h, _)) in paths.iter().zip(&slices) {
        if (*w, *h) != (width, height) {
            debug!(path = %path.display(), "Slice size differs from the first slice");
            return Err(LigamentError::shape_mismatch(
                [width as usize, height as usize, 1],
                [*w as usize, *h as usize, 1],
            ));
        }
    }

    let dims = [width as usize, height as usize, slices.len()];
    let mut data = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
    for (_, _, pixels) in slices {
        data.extend(pixels);
    }
    debug!(slices = dims[2], width = dims[0], height = dims[1], "Read slice stack");
    Grid3::from_vec(dims, data)
}

fn read_slice(path: &Path) -> LigamentResult<(u32, u32, Vec<bool>)> {
    let reader = ImageReader::open(path).map_err(|source| LigamentError::IoRead {
        path: path.to_path_buf(),
        source,
    })?;
    let image = reader
        .with_guessed_format()
        .map_err(|source| LigamentError::IoRead {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|e| LigamentError::parse_error(path, e.to_string()))?;

    // 16-bit luminance keeps every non-zero sample non-zero.
    let luma = image.to_luma16();
    let (w, h) = luma.dimensions();
    let pixels = luma.into_raw().into_iter().map(|v| v > 0).collect();
    Ok((w, h, pixels))
}

/// Write `mask` as PNG slices `<prefix>_<z>.png` (0 or 255) into `dir`.
///
/// Returns the number of slices written.
pub fn write_slice_stack(mask: &BoolGrid, dir: &Path, prefix: &str) -> LigamentResult<usize> {
    std::fs::create_dir_all(dir).map_err(|source| LigamentError::IoWrite {
        path: dir.to_path_buf(),
        source,
    })?;

    let [nx, ny, nz] = mask.dims();
    let plane = nx * ny;
    for z in 0..nz {
        let pixels: Vec<u8> = mask.as_slice()[z * plane..(z + 1) * plane]
            .iter()
            .map(|&v| if v { 255 } else { 0 })
            .collect();
        let path = dir.join(format!("{}_{:04}.png", prefix, z));
        let image = GrayImage::from_raw(nx as u32, ny as u32, pixels).ok_or_else(|| {
            LigamentError::shape_mismatch([nx, ny, 1], [plane, 1, 1])
        })?;
        image.save(&path).map_err(|e| LigamentError::IoWrite {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
    }
    debug!(dir = %dir.display(), slices = nz, "Wrote mask slices");
    Ok(nz)
}

// =========================================================================
// Extended XYZ
// =========================================================================

/// Index of the first `pos` column given an extended XYZ comment line.
///
/// Returns `None` when the line has no `Properties=` key or no `pos` entry.
pub fn xyz_position_column(comment: &str) -> Option<usize> {
    let properties = comment.split("Properties=").nth(1)?;
    let properties = properties.split_whitespace().next()?;
    let fields: Vec<&str> = properties.split(':').collect();

    let mut column = 0;
    for triple in fields.chunks(3) {
        let [name, _kind, count] = triple else {
            return None;
        };
        if *name == "pos" {
            return Some(column);
        }
        column = column.checked_add(count.parse::<usize>().ok()?)?;
    }
    None
}

/// Read atom positions from extended XYZ text.
///
/// Without a `Properties=` key the plain XYZ layout (`species x y z`) is assumed.
pub fn parse_xyz_positions(
    reader: impl BufRead,
    path: &Path,
) -> LigamentResult<Vec<Point3<f64>>> {
    let mut lines = reader.lines().enumerate();
    let mut next_line = |what: &str| -> LigamentResult<Option<(usize, String)>> {
        match lines.next() {
            Some((n, Ok(line))) => Ok(Some((n + 1, line))),
            Some((_, Err(source))) => Err(LigamentError::IoRead {
                path: path.to_path_buf(),
                source,
            }),
            None if what.is_empty() => Ok(None),
            None => Err(LigamentError::parse_error(path, format!("missing {}", what))),
        }
    };

    let _count = next_line("atom count line")?;
    let comment = next_line("comment line")?.map(|(_, line)| line).unwrap_or_default();
    let column = if comment.contains("Properties=") {
        xyz_position_column(&comment).ok_or_else(|| {
            LigamentError::parse_error(path, "Properties= has no pos entry")
        })?
    } else {
        1
    };

    let mut positions = Vec::new();
    while let Some((line_no, line)) = next_line("")? {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let coords = fields.get(column..column.saturating_add(3)).ok_or_else(|| {
            LigamentError::parse_error(
                path,
                format!(
                    "line {}: expected position columns {}..{}",
                    line_no,
                    column,
                    column.saturating_add(3)
                ),
            )
        })?;
        let mut xyz = [0.0f64; 3];
        for (slot, field) in xyz.iter_mut().zip(coords) {
            *slot = field.parse().map_err(|_| {
                LigamentError::parse_error(path, format!("line {}: bad number {:?}", line_no, field))
            })?;
            if !slot.is_finite() {
                return Err(LigamentError::parse_error(
                    path,
                    format!("line {}: non-finite coordinate", line_no),
                ));
            }
        }
        positions.push(Point3::new(xyz[0], xyz[1], xyz[2]));
    }
    Ok(positions)
}

/// Rasterize atom positions into a volume.
///
/// Positions are scaled, rounded half-to-even, shifted so every axis starts
/// at 0, and each atom sets a 2x2x2 block clipped to the grid.
pub fn rasterize_points(points: &[Point3<f64>], lattice_scale: f64) -> LigamentResult<BoolGrid> {
    if points.is_empty() {
        return Err(LigamentError::empty_volume("no atoms"));
    }

    let voxels: Vec<Vector3<i64>> = points
        .iter()
        .map(|p| (p.coords * lattice_scale).map(|c| c.round_ties_even() as i64))
        .collect();
    let min = voxels.iter().fold(voxels[0], |acc, v| acc.inf(v));
    let max = voxels.iter().fold(voxels[0], |acc, v| acc.sup(v));
    let spans: Vec<u128> = (0..3)
        .map(|i| (i128::from(max[i]) - i128::from(min[i]) + 1) as u128)
        .collect();
    let total = spans.iter().try_fold(1u128, |acc, &s| acc.checked_mul(s));
    if total.is_none_or(|t| t > MAX_RASTER_VOXELS) {
        return Err(LigamentError::invalid_config(format!(
            "atom positions span {:?} voxels at lattice_scale {}",
            spans, lattice_scale
        )));
    }
    let dims = [spans[0] as usize, spans[1] as usize, spans[2] as usize];

    let mut grid: BoolGrid = Grid3::new(dims, false);
    for v in &voxels {
        let base = [
            (v.x - min.x) as usize,
            (v.y - min.y) as usize,
            (v.z - min.z) as usize,
        ];
        for dx in 0..2 {
            for dy in 0..2 {
                for dz in 0..2 {
                    let (x, y, z) = (base[0] + dx, base[1] + dy, base[2] + dz);
                    if let Some(cell) = grid.get_mut(x, y, z) {
                        *cell = true;
                    }
                }
            }
        }
    }
    debug!(atoms = points.len(), dims = ?dims, "Rasterized atoms");
    Ok(grid)
}

/// Read an extended XYZ file into a volume.
pub fn read_xyz(path: &Path, lattice_scale: f64) -> LigamentResult<BoolGrid> {
    let file = std::fs::File::open(path).map_err(|source| LigamentError::IoRead {
        path: path.to_path_buf(),
        source,
    })?;
    let positions = parse_xyz_positions(std::io::BufReader::new(file), path)?;
    rasterize_points(&positions, lattice_scale)
}

// =========================================================================
// Resampling
// =========================================================================

/// New extent of an axis resampled from `axis_size` to `target_size` voxels.
pub fn resampled_extent(n: usize, axis_size: f64, target_size: f64) -> usize {
    ((n as f64 * axis_size / target_size).round() as usize).max(1)
}

/// Resample to an isotropic voxel size equal to the largest axis size.
///
/// Uses trilinear interpolation of the 0/1 volume with pixel-center
/// alignment; any positive interpolated value is foreground. Returns the
/// resampled grid and the common pixel size.
pub fn resample_isotropic(grid: &BoolGrid, sizes: [f64; 3]) -> LigamentResult<(BoolGrid, f64)> {
    let target = sizes.iter().copied().fold(f64::MIN, f64::max);
    let src = grid.dims();
    let dims = [
        resampled_extent(src[0], sizes[0], target),
        resampled_extent(src[1], sizes[1], target),
        resampled_extent(src[2], sizes[2], target),
    ];
    if dims == src {
        return Ok((grid.clone(), target));
    }

    // Source coordinate and blend weight per output index, per axis.
    let axis_samples = |n_in: usize, n_out: usize| -> Vec<(usize, usize, f64)> {
        let ratio = n_in as f64 / n_out as f64;
        (0..n_out)
            .map(|i| {
                let s = ((i as f64 + 0.5) * ratio - 0.5).clamp(0.0, (n_in - 1) as f64);
                let lo = s.floor() as usize;
                let hi = (lo + 1).min(n_in - 1);
                (lo, hi, s - lo as f64)
            })
            .collect()
    };
    let sx = axis_samples(src[0], dims[0]);
    let sy = axis_samples(src[1], dims[1]);
    let sz = axis_samples(src[2], dims[2]);

    let value = |x: usize, y: usize, z: usize| if grid[[x, y, z]] { 1.0 } else { 0.0 };
    let total = dims[0] * dims[1] * dims[2];
    let data: Vec<bool> = (0..total)
        .into_par_iter()
        .map(|idx| {
            let x = idx % dims[0];
            let y = (idx / dims[0]) % dims[1];
            let z = idx / (dims[0] * dims[1]);
            let (x0, x1, fx) = sx[x];
            let (y0, y1, fy) = sy[y];
            let (z0, z1, fz) = sz[z];

            let c00 = value(x0, y0, z0) * (1.0 - fx) + value(x1, y0, z0) * fx;
            let c10 = value(x0, y1, z0) * (1.0 - fx) + value(x1, y1, z0) * fx;
            let c01 = value(x0, y0, z1) * (1.0 - fx) + value(x1, y0, z1) * fx;
            let c11 = value(x0, y1, z1) * (1.0 - fx) + value(x1, y1, z1) * fx;
            let c0 = c00 * (1.0 - fy) + c10 * fy;
            let c1 = c01 * (1.0 - fy) + c11 * fy;
            c0 * (1.0 - fz) + c1 * fz > 0.0
        })
        .collect();

    info!(from = ?src, to = ?dims, pixel_size = target, "Resampled to isotropic voxels");
    Ok((Grid3::from_vec(dims, data)?, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XYZ: &str = "\
3
Lattice=\"10 0 0 0 10 0 0 0 10\" Properties=species:S:1:id:I:1:pos:R:3
Au 1 0.0 0.0 0.0
Au 2 2.5 0.0 0.0
Au 3 0.0 5.0 2.5
";

    #[test]
    fn test_position_column() {
        assert_eq!(
            xyz_position_column("Properties=species:S:1:pos:R:3 Time=0"),
            Some(1)
        );
        assert_eq!(
            xyz_position_column("a=1 Properties=species:S:1:id:I:1:pos:R:3"),
            Some(2)
        );
        assert_eq!(xyz_position_column("Properties=pos:R:3"), Some(0));
        assert_eq!(xyz_position_column("Properties=species:S:1"), None);
        assert_eq!(xyz_position_column("no properties"), None);
    }

    #[test]
    fn test_parse_positions() {
        let positions = parse_xyz_positions(SAMPLE_XYZ.as_bytes(), Path::new("sample.xyz")).unwrap();
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[2], Point3::new(0.0, 5.0, 2.5));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let text = "1\nProperties=species:S:1:pos:R:3\nAu 1.0 abc 2.0\n";
        let err = parse_xyz_positions(text.as_bytes(), Path::new("bad.xyz")).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_plain_xyz_layout() {
        let text = "1\ncomment\nCu 1.0 2.0 3.0\n";
        let positions = parse_xyz_positions(text.as_bytes(), Path::new("plain.xyz")).unwrap();
        assert_eq!(positions, vec![Point3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_rasterize() {
        let positions = parse_xyz_positions(SAMPLE_XYZ.as_bytes(), Path::new("sample.xyz")).unwrap();
        // Scale 1: voxels (0,0,0), (2,0,0) [2.5 rounds to even], (0,5,2).
        let grid = rasterize_points(&positions, 1.0).unwrap();
        assert_eq!(grid.dims(), [3, 6, 3]);
        assert!(grid[[0, 0, 0]] && grid[[1, 1, 1]]);
        assert!(grid[[2, 0, 0]]);
        assert!(grid[[0, 5, 2]]);
        // The block of the atom at x = 2 is clipped by the grid.
        assert!(grid.get(3, 0, 0).is_none());
        assert!(rasterize_points(&[], 1.0).is_err());
    }

    #[test]
    fn test_parse_pixel_size() {
        assert_eq!(parse_pixel_size(" 0.25 ").unwrap(), 0.25);
        for bad in ["", "abc", "0", "-1", "inf", "NaN"] {
            let err = parse_pixel_size(bad).unwrap_err();
            assert_eq!(err.code().as_str(), "LIG-1004", "input {:?}", bad);
        }
    }

    #[test]
    fn test_resample_extents() {
        assert_eq!(resampled_extent(100, 0.5, 1.0), 50);
        assert_eq!(resampled_extent(100, 1.0, 1.0), 100);
        assert_eq!(resampled_extent(1, 0.1, 1.0), 1);

        let grid: BoolGrid = Grid3::new([10, 10, 4], true);
        let (resampled, size) = resample_isotropic(&grid, [0.5, 0.5, 1.0]).unwrap();
        assert_eq!(size, 1.0);
        assert_eq!(resampled.dims(), [5, 5, 4]);
        assert!(resampled.iter().all(|&v| v));
    }

    #[test]
    fn test_resample_keeps_isolated_voxel() {
        let mut grid: BoolGrid = Grid3::new([8, 8, 8], false);
        grid[[4, 4, 4]] = true;
        let (resampled, _) = resample_isotropic(&grid, [0.5, 0.5, 0.5]).unwrap();
        assert_eq!(resampled.dims(), [8, 8, 8]);
        let (coarse, _) = resample_isotropic(&grid, [0.5, 0.5, 1.0]).unwrap();
        assert_eq!(coarse.dims(), [4, 4, 8]);
        assert!(coarse.any());
    }

    #[test]
    fn test_truncate_extent() {
        let grid: BoolGrid = Grid3::new([10, 3, 20], true);
        assert_eq!(truncate_extent(&grid, 5).dims(), [5, 3, 5]);
    }

    #[test]
    fn test_slice_stack_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut mask: BoolGrid = Grid3::new([6, 4, 3], false);
        mask[[1, 2, 0]] = true;
        mask[[5, 3, 2]] = true;

        let written = write_slice_stack(&mask, dir.path(), "mask").unwrap();
        assert_eq!(written, 3);
        let read = read_slice_stack(dir.path()).unwrap();
        assert_eq!(read, mask);
    }

    #[test]
    fn test_load_volume_pixel_size_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atoms.xyz");
        std::fs::write(&path, SAMPLE_XYZ).unwrap();

        let options = LoadOptions {
            pixel_sizes: Some(["1".to_string(), "x".to_string(), "1".to_string()]),
            lattice_scale: 1.0,
            ..LoadOptions::default()
        };
        let ingested = load_volume(&path, &options).unwrap();
        assert_eq!(ingested.volume.pixel_size(), 1.0);
        assert_eq!(ingested.warnings.len(), 1);
        assert_eq!(ingested.volume.dims(), [3, 6, 3]);
    }

    #[test]
    fn test_load_volume_unsupported() {
        let err = load_volume("volume.obj", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LigamentError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_volume_inverts_after_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mask: BoolGrid = Grid3::new([3, 3, 2], true);
        write_slice_stack(&mask, dir.path(), "slice").unwrap();
        let options = LoadOptions {
            invert: true,
            ..LoadOptions::default()
        };
        let ingested = load_volume(dir.path(), &options).unwrap();
        assert_eq!(ingested.volume.foreground_voxels(), 0);
    }
}
