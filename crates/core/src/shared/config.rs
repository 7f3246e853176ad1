use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    CLUSTER_EPS, CLUSTER_MIN_POINTS, CONFIDENCE_THRESHOLD, CROP_EXTENSION,
};

/// Raw detector pre-filter, applied before the acceptance threshold.
pub const DEFAULT_DETECTOR_CONFIDENCE: f64 = 0.25;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one processing run. Defaults reproduce the fixed constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub confidence_threshold: f64,
    pub cluster_eps: f64,
    pub cluster_min_points: usize,
    pub detector_confidence: f64,
    pub crop_extension: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: CONFIDENCE_THRESHOLD,
            cluster_eps: CLUSTER_EPS,
            cluster_min_points: CLUSTER_MIN_POINTS,
            detector_confidence: DEFAULT_DETECTOR_CONFIDENCE,
            crop_extension: CROP_EXTENSION.to_string(),
        }
    }
}

impl ProcessingConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be between 0.0 and 1.0, got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.detector_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detector_confidence must be between 0.0 and 1.0, got {}",
                self.detector_confidence
            )));
        }
        if !self.cluster_eps.is_finite() || self.cluster_eps <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cluster_eps must be a positive number, got {}",
                self.cluster_eps
            )));
        }
        if self.cluster_min_points == 0 {
            return Err(ConfigError::Invalid(
                "cluster_min_points must be at least 1".into(),
            ));
        }
        if self.crop_extension.trim().is_empty() {
            return Err(ConfigError::Invalid("crop_extension must not be empty".into()));
        }
        Ok(())
    }
}
