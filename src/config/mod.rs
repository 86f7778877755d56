//! Configuration types for the label-center pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Distance (in input coordinate units) under which a point joins a cluster.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.5;

/// Label value marking unlabeled/background points.
pub const BACKGROUND_LABEL: i64 = 0;

/// Parameters of the clustering engine.
///
/// Not part of the serialized [`PipelineConfig`]: the `.labels` output is
/// always produced with the defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusteringConfig {
    /// A point joins a cluster when strictly closer than this to its center.
    pub distance_threshold: f64,
    /// Points carrying this label are skipped.
    pub background_label: i64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            background_label: BACKGROUND_LABEL,
        }
    }
}

/// What the batch driver does when one file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the run at the first failing file.
    #[default]
    Abort,
    /// Log the failure, skip the file and keep going.
    Continue,
}

/// Configuration for batch processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Skip files that fail to load or cluster instead of aborting
    #[serde(default)]
    pub keep_going: bool,

    /// Process files concurrently (one file per task)
    #[serde(default)]
    pub parallel: bool,
}

impl BatchConfig {
    /// Error policy implied by `keep_going`.
    pub fn error_policy(&self) -> ErrorPolicy {
        if self.keep_going {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::Abort
        }
    }
}

/// Main pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(skip)]
    pub clustering: ClusteringConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
