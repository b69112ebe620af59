//! Analysis configuration.
//!
//! [`AnalysisParams`] bundles every tunable of one run. All sections use
//! `#[serde(default)]`, so a configuration file only needs the keys it
//! changes.
//!
//! # Example
//!
//! ```toml
//! [diameter]
//! trim_factor = 2
//! noise_threshold = 2.0
//!
//! [node_mask]
//! enabled = true
//! max_radius = 64
//!
//! [node_mask.strategy]
//! kind = "sphere_convolution"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LigamentError, LigamentResult};
use crate::metrics::DiameterParams;
use crate::node_mask::{NodeMaskParams, NodeMaskStrategy};

/// Parameters for the thinning collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonParams {
    /// Treat the input as an existing skeleton and skip thinning.
    pub prethinned: bool,
    /// Upper bound on thinning passes; 0 runs until no voxel is removed.
    pub max_passes: usize,
}

/// All parameters of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub diameter: DiameterParams,
    pub node_mask: NodeMaskParams,
    pub thinning: SkeletonParams,
}

impl AnalysisParams {
    /// Defaults with node mask reconstruction enabled.
    pub fn with_node_mask() -> Self {
        Self {
            node_mask: NodeMaskParams::sphere_convolution(),
            ..Self::default()
        }
    }

    /// Defaults for inputs that are already skeletons.
    pub fn prethinned() -> Self {
        Self {
            thinning: SkeletonParams {
                prethinned: true,
                ..SkeletonParams::default()
            },
            ..Self::default()
        }
    }

    /// Load parameters from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> LigamentResult<()> {
        if !self.diameter.noise_threshold.is_finite() || self.diameter.noise_threshold < 0.0 {
            return Err(LigamentError::invalid_config(format!(
                "diameter.noise_threshold must be a non-negative number, got {}",
                self.diameter.noise_threshold
            )));
        }
        if let NodeMaskStrategy::IterativeDilation { max_iterations: 0 } =
            self.node_mask.strategy
        {
            return Err(LigamentError::invalid_config(
                "node_mask.strategy.max_iterations must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "config")]
impl AnalysisParams {
    /// Load parameters from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LigamentError::InvalidConfig`] if the TOML is invalid or out of range.
    pub fn from_toml(toml_str: &str) -> LigamentResult<Self> {
        let params: Self =
            toml::from_str(toml_str).map_err(|e| LigamentError::invalid_config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> LigamentResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| LigamentError::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> LigamentResult<String> {
        toml::to_string_pretty(self).map_err(|e| LigamentError::invalid_config(e.to_string()))
    }

    /// Save parameters to a TOML file.
    pub fn save_toml(&self, path: impl AsRef<std::path::Path>) -> LigamentResult<()> {
        let path = path.as_ref();
        let toml_str = self.to_toml()?;
        std::fs::write(path, toml_str).map_err(|source| LigamentError::IoWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = AnalysisParams::default();
        assert_eq!(params.diameter.trim_factor, 2);
        assert!(!params.node_mask.enabled);
        assert!(!params.thinning.prethinned);
        assert!(params.validate().is_ok());
        assert!(AnalysisParams::with_node_mask().node_mask.enabled);
    }

    #[test]
    fn test_json_roundtrip_preserves_strategy() {
        let mut params = AnalysisParams::default();
        params.node_mask = NodeMaskParams::iterative_dilation();
        let json = params.to_json().unwrap();
        assert!(json.contains("iterative_dilation"));
        assert_eq!(AnalysisParams::from_json(&json).unwrap(), params);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut params = AnalysisParams::default();
        params.diameter.noise_threshold = -1.0;
        assert!(params.validate().is_err());

        let mut params = AnalysisParams::default();
        params.node_mask.strategy = NodeMaskStrategy::IterativeDilation { max_iterations: 0 };
        assert!(params.validate().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_partial_toml_uses_defaults() {
        let params = AnalysisParams::from_toml(
            r#"
            [node_mask]
            enabled = true
            max_radius = 64
            "#,
        )
        .unwrap();
        assert!(params.node_mask.enabled);
        assert_eq!(params.node_mask.max_radius, 64);
        assert_eq!(params.node_mask.strategy, NodeMaskStrategy::SphereConvolution);
        assert_eq!(params.diameter, DiameterParams::default());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_invalid_toml() {
        let err = AnalysisParams::from_toml("diameter = 3").unwrap_err();
        assert_eq!(err.code().as_str(), "LIG-4001");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_toml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.toml");
        let params = AnalysisParams::with_node_mask();
        params.save_toml(&path).unwrap();
        assert_eq!(AnalysisParams::from_toml_file(&path).unwrap(), params);
    }
}
