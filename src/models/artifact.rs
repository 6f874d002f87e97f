//! Edge scorer artifact: serialized model parameters.

use crate::error::{PipelineError, Result};
use crate::feature_extractor::Standardizer;
use crate::types::features::{FEATURE_COUNT, FEATURE_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Current artifact format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Summary of the corpus an artifact was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub train_records: usize,
    pub train_fraud: usize,
    pub eval_records: usize,
    pub eval_fraud: usize,
    pub seed: u64,
    pub iterations: usize,
    pub converged: bool,
}

/// Trained parameters of the edge scorer.
///
/// `weights[i]` belongs to `feature_names[i]`, which must equal the canonical
/// schema. Created once by the trainer, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
    /// Fitted on the training split's raw `Amount`
    pub amount_scaler: Standardizer,
    /// Fitted on the training split's raw `Time`
    pub time_scaler: Standardizer,
    pub trained_at: DateTime<Utc>,
    pub summary: TrainingSummary,
}

impl ScorerArtifact {
    pub fn new(
        weights: Vec<f64>,
        intercept: f64,
        amount_scaler: Standardizer,
        time_scaler: Standardizer,
        summary: TrainingSummary,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            weights,
            intercept,
            amount_scaler,
            time_scaler,
            trained_at: Utc::now(),
            summary,
        }
    }

    /// Check that the artifact matches the canonical schema.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PipelineError::ArtifactNotLoaded {
                reason: format!(
                    "unsupported artifact format version {} (expected {})",
                    self.format_version, ARTIFACT_FORMAT_VERSION
                ),
            });
        }

        if self.feature_names.len() != FEATURE_COUNT {
            return Err(PipelineError::schema(
                "<artifact>",
                format!(
                    "artifact lists {} features, schema has {}",
                    self.feature_names.len(),
                    FEATURE_COUNT
                ),
            ));
        }
        for (i, (got, expected)) in self.feature_names.iter().zip(FEATURE_NAMES).enumerate() {
            if got != expected {
                return Err(PipelineError::schema(
                    expected,
                    format!("artifact feature {} is `{}`, expected `{}`", i, got, expected),
                ));
            }
        }

        if self.weights.len() != FEATURE_COUNT {
            return Err(PipelineError::schema(
                "<artifact>",
                format!("artifact has {} weights, expected {}", self.weights.len(), FEATURE_COUNT),
            ));
        }
        if let Some(i) = self.weights.iter().position(|w| !w.is_finite()) {
            return Err(PipelineError::schema(FEATURE_NAMES[i], "artifact weight is not finite"));
        }
        if !self.intercept.is_finite() {
            return Err(PipelineError::schema("<intercept>", "artifact intercept is not finite"));
        }
        for (field, scaler) in [("scaled_amount", &self.amount_scaler), ("scaled_time", &self.time_scaler)] {
            if !scaler.mean.is_finite() || !scaler.std.is_finite() || scaler.std <= 0.0 {
                return Err(PipelineError::schema(
                    field,
                    format!("invalid standardization (mean={}, std={})", scaler.mean, scaler.std),
                ));
            }
        }

        Ok(())
    }

    /// Serialize to JSON and write to `path`, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_err = |source| PipelineError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        fs::write(path, json).map_err(write_err)?;

        info!(path = %path.display(), "Scorer artifact saved");
        Ok(())
    }

    /// Load and validate an artifact from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        info!(path = %path.display(), "Loading scorer artifact");

        let bytes = fs::read(path).map_err(|e| PipelineError::ArtifactNotLoaded {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let artifact: Self =
            serde_json::from_slice(&bytes).map_err(|e| PipelineError::ArtifactNotLoaded {
                reason: format!("cannot parse {}: {}", path.display(), e),
            })?;
        artifact.validate()?;

        info!(
            path = %path.display(),
            trained_at = %artifact.trained_at,
            train_records = artifact.summary.train_records,
            "Scorer artifact loaded"
        );

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScorerArtifact {
        let weights = (0..FEATURE_COUNT).map(|i| (i as f64 - 14.5) / 7.3).collect();
        ScorerArtifact::new(
            weights,
            -1.234_567_890_123,
            Standardizer { mean: 88.35, std: 250.12 },
            Standardizer { mean: 94_813.86, std: 47_488.15 },
            TrainingSummary {
                train_records: 80,
                train_fraud: 8,
                eval_records: 20,
                eval_fraud: 2,
                seed: 42,
                iterations: 9,
                converged: true,
            },
        )
    }

    #[test]
    fn test_save_load_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("edge.json");
        let artifact = sample();

        artifact.save(&path).unwrap();
        let loaded = ScorerArtifact::load(&path).unwrap();

        assert_eq!(artifact, loaded);
    }

    #[test]
    fn test_missing_file_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScorerArtifact::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotLoaded { .. }));
    }

    #[test]
    fn test_reordered_features_rejected() {
        let mut artifact = sample();
        artifact.feature_names.swap(28, 29);

        match artifact.validate().unwrap_err() {
            PipelineError::SchemaMismatch { field, .. } => assert_eq!(field, "scaled_amount"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_weight_count_rejected() {
        let mut artifact = sample();
        artifact.weights.pop();
        assert!(matches!(
            artifact.validate(),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut artifact = sample();
        artifact.format_version = 99;
        assert!(matches!(
            artifact.validate(),
            Err(PipelineError::ArtifactNotLoaded { .. })
        ));
    }
}
