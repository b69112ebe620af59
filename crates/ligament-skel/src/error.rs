//! Error types for thinning and distance transforms.
//!
//! Codes follow the pattern `SKEL-XXXX`:
//! - `SKEL-1xxx`: Input errors
//! - `SKEL-2xxx`: Computation errors

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for skeleton operations.
pub type SkeletonResult<T> = Result<T, SkeletonError>;

/// Machine-readable error codes for skeleton operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkeletonErrorCode {
    /// SKEL-1001: Input grid has no voxels
    EmptyGrid = 1001,
    /// SKEL-2001: Distance transform without any background voxel
    NoBackground = 2001,
}

impl SkeletonErrorCode {
    /// Returns the error code as a string in the format `SKEL-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkeletonErrorCode::EmptyGrid => "SKEL-1001",
            SkeletonErrorCode::NoBackground => "SKEL-2001",
        }
    }
}

impl std::fmt::Display for SkeletonErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from the thinning and distance transform collaborators.
#[derive(Debug, Error, Diagnostic)]
pub enum SkeletonError {
    /// Input grid has a zero-length axis.
    #[error("grid {dims:?} has no voxels")]
    #[diagnostic(
        code(skel::input::empty),
        help("Load a volume with at least one slice of non-zero size.")
    )]
    EmptyGrid { dims: [usize; 3] },

    /// Every voxel is foreground, so no distance to background exists.
    #[error("grid {dims:?} has no background voxel")]
    #[diagnostic(
        code(skel::distance::no_background),
        help("The volume is fully solid. Check the threshold or use --invert if the phases are swapped.")
    )]
    NoBackground { dims: [usize; 3] },
}

impl SkeletonError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> SkeletonErrorCode {
        match self {
            SkeletonError::EmptyGrid { .. } => SkeletonErrorCode::EmptyGrid,
            SkeletonError::NoBackground { .. } => SkeletonErrorCode::NoBackground,
        }
    }

    /// Create an empty grid error.
    pub fn empty_grid(dims: [usize; 3]) -> Self {
        SkeletonError::EmptyGrid { dims }
    }

    /// Create a no-background error.
    pub fn no_background(dims: [usize; 3]) -> Self {
        SkeletonError::NoBackground { dims }
    }
}
