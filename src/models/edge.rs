//! Edge tier: fast logistic scorer, invoked on every transaction

use crate::error::{PipelineError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::models::artifact::ScorerArtifact;
use crate::types::features::FeatureVector;
use crate::types::transaction::RawTransaction;
use std::sync::Arc;
use tracing::info;

/// Logistic link, stable for large `|z|`.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
pub(crate) fn log1p_exp(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Inverse of [`sigmoid`]. Clamps `p` away from 0 and 1.
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-15, 1.0 - 1e-15);
    (p / (1.0 - p)).ln()
}

/// Edge scorer over an immutable, shared artifact.
///
/// Pure: the same artifact and input always give the same probability. Safe
/// to share across tasks without locking.
#[derive(Debug, Clone)]
pub struct EdgeScorer {
    artifact: Arc<ScorerArtifact>,
    extractor: FeatureExtractor,
}

impl EdgeScorer {
    /// Wrap a loaded artifact. Fails if it does not match the canonical schema.
    pub fn new(artifact: Arc<ScorerArtifact>) -> Result<Self> {
        artifact.validate()?;
        let extractor = FeatureExtractor::new(artifact.amount_scaler, artifact.time_scaler);
        Ok(Self { artifact, extractor })
    }

    /// Load an artifact from disk and wrap it.
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let scorer = Self::new(Arc::new(ScorerArtifact::load(path)?))?;
        info!(
            intercept = scorer.artifact.intercept,
            "Edge scorer ready"
        );
        Ok(scorer)
    }

    /// Linear decision function `w . x + b`.
    pub fn decision_function(&self, features: &FeatureVector) -> f64 {
        self.artifact.intercept
            + features
                .values()
                .iter()
                .zip(&self.artifact.weights)
                .map(|(x, w)| x * w)
                .sum::<f64>()
    }

    /// Fraud probability for an already standardized feature vector.
    ///
    /// Unchecked: a finite but extreme input can overflow the decision
    /// function and yield NaN. Use [`EdgeScorer::score`] on untrusted input.
    pub fn predict_proba(&self, features: &FeatureVector) -> f64 {
        sigmoid(self.decision_function(features))
    }

    /// Fraud probability, rejecting inputs whose decision function is not finite.
    ///
    /// The `SchemaMismatch` names the feature with the largest contribution.
    pub fn score(&self, features: &FeatureVector) -> Result<f64> {
        let z = self.decision_function(features);
        if z.is_finite() {
            return Ok(sigmoid(z));
        }

        let contributions: Vec<f64> = features
            .values()
            .iter()
            .zip(&self.artifact.weights)
            .map(|(x, w)| x * w)
            .collect();
        let worst = contributions
            .iter()
            .position(|c| !c.is_finite())
            .or_else(|| {
                contributions
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);
        let field = self
            .artifact
            .feature_names
            .get(worst)
            .cloned()
            .unwrap_or_else(|| "intercept".to_string());
        Err(PipelineError::schema(
            field,
            format!("decision function is {} for this input", z),
        ))
    }

    /// Standardize a raw transaction with the artifact's parameters.
    pub fn extract(&self, tx: &RawTransaction) -> Result<FeatureVector> {
        self.extractor.extract(tx)
    }

    /// Fraud probability for a raw transaction.
    pub fn predict_raw(&self, tx: &RawTransaction) -> Result<f64> {
        self.score(&self.extract(tx)?)
    }

    /// Run inference on a batch of feature vectors
    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Vec<f64> {
        batch.iter().map(|f| self.predict_proba(f)).collect()
    }

    pub fn artifact(&self) -> &Arc<ScorerArtifact> {
        &self.artifact
    }
}
