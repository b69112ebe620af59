//! Error types for ligament network analysis with rich diagnostics.
//!
//! This module provides error handling with:
//! - Machine-readable error codes for programmatic handling
//! - Context about which stage, category or input value failed
//! - Recovery suggestions for common issues
//! - Terminal display via miette
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `LIG-XXXX`:
//! - `LIG-1xxx`: Input errors (file reading, parsing, scaling, shapes)
//! - `LIG-2xxx`: Model state errors (no volume, busy, cancelled)
//! - `LIG-3xxx`: Computation errors (empty statistics, stage failures)
//! - `LIG-4xxx`: Configuration errors
//!
//! # Example
//!
//! ```rust,ignore
//! use ligament_net::{LigamentError, ErrorCode};
//!
//! let err = LigamentError::no_volume_loaded();
//! println!("Error code: {}", err.code()); // LIG-2001
//! println!("Recovery: {}", err.recovery_suggestion());
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::metrics::MeasurementCategory;
use crate::stages::{PipelineStage, StageError};

/// Result type alias for ligament network operations.
pub type LigamentResult<T> = Result<T, LigamentError>;

/// Machine-readable error codes.
///
/// Codes follow the pattern `LIG-XXXX` where:
/// - 1xxx = Input errors
/// - 2xxx = Model state errors
/// - 3xxx = Computation errors
/// - 4xxx = Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input errors (1xxx)
    /// LIG-1001: Failed to read file
    IoRead = 1001,
    /// LIG-1002: Failed to write file
    IoWrite = 1002,
    /// LIG-1003: Failed to parse input data
    ParseError = 1003,
    /// LIG-1004: Pixel size missing, non-numeric or non-positive
    InvalidPixelSize = 1004,
    /// LIG-1005: Grid dimensions do not agree
    ShapeMismatch = 1005,
    /// LIG-1006: Unsupported input format
    UnsupportedFormat = 1006,
    /// LIG-1007: Input contains no voxels
    EmptyVolume = 1007,

    // Model state errors (2xxx)
    /// LIG-2001: Analysis requested before a volume was loaded
    NoVolumeLoaded = 2001,
    /// LIG-2002: Another analysis run is in flight
    PipelineBusy = 2002,
    /// LIG-2003: Analysis run was cancelled
    Cancelled = 2003,

    // Computation errors (3xxx)
    /// LIG-3001: Statistic over an empty measurement set
    EmptyDiameterSet = 3001,
    /// LIG-3002: Skeletonizer or distance transform failed
    ExternalStageFailure = 3002,

    // Configuration errors (4xxx)
    /// LIG-4001: Configuration could not be parsed or serialized
    InvalidConfig = 4001,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `LIG-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "LIG-1001",
            ErrorCode::IoWrite => "LIG-1002",
            ErrorCode::ParseError => "LIG-1003",
            ErrorCode::InvalidPixelSize => "LIG-1004",
            ErrorCode::ShapeMismatch => "LIG-1005",
            ErrorCode::UnsupportedFormat => "LIG-1006",
            ErrorCode::EmptyVolume => "LIG-1007",
            ErrorCode::NoVolumeLoaded => "LIG-2001",
            ErrorCode::PipelineBusy => "LIG-2002",
            ErrorCode::Cancelled => "LIG-2003",
            ErrorCode::EmptyDiameterSet => "LIG-3001",
            ErrorCode::ExternalStageFailure => "LIG-3002",
            ErrorCode::InvalidConfig => "LIG-4001",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for analysis errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Load a volume before requesting measurements.
    LoadVolume,
    /// Wait for the running analysis or cancel it.
    WaitForRun,
    /// Check the input data for the listed problems.
    CheckInput { checks: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// The structure is too small or too sparse for this statistic.
    EnlargeVolume,
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::LoadVolume => {
                write!(f, "Load a volume (image stack or XYZ file) before running the analysis")
            }
            RecoverySuggestion::WaitForRun => {
                write!(f, "Wait for the running analysis to finish, or cancel it first")
            }
            RecoverySuggestion::CheckInput { checks } => {
                write!(f, "Check the input for: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::EnlargeVolume => {
                write!(
                    f,
                    "Use a larger sub-volume so that measurements survive the border trim"
                )
            }
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

/// Errors that can occur while loading volumes or running the analysis.
#[derive(Debug, Error, Diagnostic)]
pub enum LigamentError {
    /// Error reading from a file.
    #[error("failed to read {path}")]
    #[diagnostic(
        code(ligament::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write {path}")]
    #[diagnostic(
        code(ligament::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing input data.
    #[error("failed to parse {path}: {details}")]
    #[diagnostic(
        code(ligament::parse::error),
        help("The file may be truncated or use an unsupported layout variant.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unsupported input format.
    #[error("unsupported input format: {extension:?}")]
    #[diagnostic(
        code(ligament::format::unsupported),
        help("Supported inputs: a directory of PNG/TIFF/BMP slices, or an extended XYZ file")
    )]
    UnsupportedFormat { extension: Option<String> },

    /// Input without any voxels.
    #[error("volume is empty: {details}")]
    #[diagnostic(
        code(ligament::input::empty),
        help("The input must contain at least one slice with non-zero dimensions.")
    )]
    EmptyVolume { details: String },

    /// Pixel size missing, non-numeric or non-positive.
    #[error("invalid pixel size {value:?}: {details}")]
    #[diagnostic(
        code(ligament::input::pixel_size),
        help("Pass positive numeric pixel sizes; pixel size 1 is used otherwise.")
    )]
    InvalidPixelSize { value: String, details: String },

    /// Grid dimensions do not agree.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    #[diagnostic(code(ligament::input::shape))]
    ShapeMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    /// Analysis requested before a volume was loaded.
    #[error("no volume loaded")]
    #[diagnostic(
        code(ligament::model::no_volume),
        help("Load a volume before running the analysis.")
    )]
    NoVolumeLoaded,

    /// Another analysis run is in flight on the same model.
    #[error("an analysis run is already in progress")]
    #[diagnostic(
        code(ligament::model::busy),
        help("Runs are not queued. Wait for the running analysis or cancel it.")
    )]
    PipelineBusy,

    /// Analysis run was cancelled.
    #[error("analysis cancelled before {stage}")]
    #[diagnostic(code(ligament::model::cancelled))]
    Cancelled { stage: String },

    /// Statistic over an empty measurement set.
    #[error("no {category} measurements: statistic is undefined")]
    #[diagnostic(
        code(ligament::metrics::empty),
        help("The structure may be too small for the border trim, or contain no features of this kind.")
    )]
    EmptyDiameterSet { category: MeasurementCategory },

    /// Skeletonizer or distance transform failed.
    #[error("{stage} failed")]
    #[diagnostic(
        code(ligament::stage::failed),
        help("The run was aborted and the previous results were kept.")
    )]
    ExternalStageFailure {
        stage: PipelineStage,
        #[source]
        source: StageError,
    },

    /// Configuration could not be parsed or serialized.
    #[error("invalid configuration: {details}")]
    #[diagnostic(
        code(ligament::config::invalid),
        help("Run `ligament config` to write a default configuration to start from.")
    )]
    InvalidConfig { details: String },
}

impl LigamentError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            LigamentError::IoRead { .. } => ErrorCode::IoRead,
            LigamentError::IoWrite { .. } => ErrorCode::IoWrite,
            LigamentError::ParseError { .. } => ErrorCode::ParseError,
            LigamentError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            LigamentError::EmptyVolume { .. } => ErrorCode::EmptyVolume,
            LigamentError::InvalidPixelSize { .. } => ErrorCode::InvalidPixelSize,
            LigamentError::ShapeMismatch { .. } => ErrorCode::ShapeMismatch,
            LigamentError::NoVolumeLoaded => ErrorCode::NoVolumeLoaded,
            LigamentError::PipelineBusy => ErrorCode::PipelineBusy,
            LigamentError::Cancelled { .. } => ErrorCode::Cancelled,
            LigamentError::EmptyDiameterSet { .. } => ErrorCode::EmptyDiameterSet,
            LigamentError::ExternalStageFailure { .. } => ErrorCode::ExternalStageFailure,
            LigamentError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            LigamentError::IoRead { .. } | LigamentError::IoWrite { .. } => {
                RecoverySuggestion::CheckInput {
                    checks: vec!["file permissions".to_string(), "path spelling".to_string()],
                }
            }
            LigamentError::ParseError { .. } | LigamentError::UnsupportedFormat { .. } => {
                RecoverySuggestion::CheckInput {
                    checks: vec![
                        "file format".to_string(),
                        "consistent slice dimensions".to_string(),
                    ],
                }
            }
            LigamentError::EmptyVolume { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["non-empty slices".to_string()],
            },
            LigamentError::InvalidPixelSize { value, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("pixel_size".to_string(), format!("a positive number, not {:?}", value))],
            },
            LigamentError::ShapeMismatch { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["grid dimensions".to_string()],
            },
            LigamentError::NoVolumeLoaded => RecoverySuggestion::LoadVolume,
            LigamentError::PipelineBusy => RecoverySuggestion::WaitForRun,
            LigamentError::Cancelled { .. } => RecoverySuggestion::None,
            LigamentError::EmptyDiameterSet { .. } => RecoverySuggestion::EnlargeVolume,
            LigamentError::ExternalStageFailure { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["foreground and background both present".to_string()],
            },
            LigamentError::InvalidConfig { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("config".to_string(), "see `ligament config`".to_string())],
            },
        }
    }

    /// Whether the condition is handled in place rather than aborting a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LigamentError::InvalidPixelSize { .. } | LigamentError::EmptyDiameterSet { .. }
        )
    }

    // Constructor helpers

    /// Create a no-volume error.
    pub fn no_volume_loaded() -> Self {
        LigamentError::NoVolumeLoaded
    }

    /// Create a busy error.
    pub fn pipeline_busy() -> Self {
        LigamentError::PipelineBusy
    }

    /// Create a cancellation error naming the stage that did not start.
    pub fn cancelled(stage: impl Into<String>) -> Self {
        LigamentError::Cancelled {
            stage: stage.into(),
        }
    }

    /// Create an empty measurement set error.
    pub fn empty_diameter_set(category: MeasurementCategory) -> Self {
        LigamentError::EmptyDiameterSet { category }
    }

    /// Create a stage failure error.
    pub fn stage_failure(stage: PipelineStage, source: StageError) -> Self {
        LigamentError::ExternalStageFailure { stage, source }
    }

    /// Create an invalid pixel size error.
    pub fn invalid_pixel_size(value: impl Into<String>, details: impl Into<String>) -> Self {
        LigamentError::InvalidPixelSize {
            value: value.into(),
            details: details.into(),
        }
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: [usize; 3], actual: [usize; 3]) -> Self {
        LigamentError::ShapeMismatch { expected, actual }
    }

    /// Create a parse error.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        LigamentError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an empty volume error.
    pub fn empty_volume(details: impl Into<String>) -> Self {
        LigamentError::EmptyVolume {
            details: details.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(details: impl Into<String>) -> Self {
        LigamentError::InvalidConfig {
            details: details.into(),
        }
    }
}
