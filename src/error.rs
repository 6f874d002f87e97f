//! Error types for the screening pipeline.
//!
//! Setup errors (dataset, artifact, threshold configuration) abort before any
//! transaction is screened. Per-transaction errors fail only the transaction
//! that raised them; the pipeline holds no mutable state they could corrupt.

use crate::types::verdict::TransitionEvent;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The labeled training dataset does not exist.
    #[error("dataset not found at {}", .path.display())]
    DatasetNotFound { path: PathBuf },

    /// Empty, single-class or malformed training corpus.
    #[error("training data error: {0}")]
    TrainingData(String),

    /// No usable scorer artifact is available.
    #[error("scorer artifact not loaded: {reason}")]
    ArtifactNotLoaded { reason: String },

    /// Feature shape, order or value does not match the canonical schema.
    #[error("schema mismatch at field `{field}`: {reason}")]
    SchemaMismatch { field: String, reason: String },

    /// Routing bounds violate `0 <= low < high <= 1`.
    #[error("invalid thresholds (low={low}, high={high}): {reason}")]
    InvalidThreshold { low: f64, high: f64, reason: String },

    /// The deep tier exceeded its time budget on an escalated transaction.
    #[error(
        "deep tier timed out after {:?} (budget {:?}, edge probability {edge_probability:.4})",
        .elapsed,
        .budget
    )]
    DeepTierTimeout {
        budget: Duration,
        elapsed: Duration,
        edge_probability: f64,
        /// Transitions taken before the deep tier gave up
        events: Vec<TransitionEvent>,
    },

    /// The deep tier scorer reported a failure.
    #[error("deep tier `{scorer}` failed: {reason}")]
    DeepTierFailure {
        scorer: String,
        reason: String,
        events: Vec<TransitionEvent>,
    },

    /// Writing the artifact file failed.
    #[error("failed to write artifact to {}: {source}", .path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn deep_failure(scorer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeepTierFailure {
            scorer: scorer.into(),
            reason: reason.into(),
            events: Vec::new(),
        }
    }

    /// Attach the transition trail to a deep tier error. Other errors pass through.
    pub(crate) fn with_events(mut self, trail: Vec<TransitionEvent>) -> Self {
        if let Self::DeepTierTimeout { events, .. } | Self::DeepTierFailure { events, .. } = &mut self {
            *events = trail;
        }
        self
    }

    /// Transitions a transaction went through before this error, if any.
    pub fn events(&self) -> &[TransitionEvent] {
        match self {
            Self::DeepTierTimeout { events, .. } | Self::DeepTierFailure { events, .. } => events,
            _ => &[],
        }
    }

    /// Whether the error is scoped to a single transaction.
    ///
    /// Anything else is a setup error and should stop the service.
    pub fn is_per_transaction(&self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch { .. } | Self::DeepTierTimeout { .. } | Self::DeepTierFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(PipelineError::schema("V3", "missing").is_per_transaction());
        assert!(PipelineError::DeepTierTimeout {
            budget: Duration::from_secs(1),
            elapsed: Duration::from_secs(2),
            edge_probability: 0.5,
            events: Vec::new(),
        }
        .is_per_transaction());
        assert!(!PipelineError::InvalidThreshold {
            low: 0.9,
            high: 0.3,
            reason: "low must be below high".to_string(),
        }
        .is_per_transaction());
        assert!(!PipelineError::DatasetNotFound {
            path: PathBuf::from("creditcard.csv"),
        }
        .is_per_transaction());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = PipelineError::schema("scaled_amount", "value is NaN");
        let msg = err.to_string();
        assert!(msg.contains("scaled_amount"));
        assert!(msg.contains("NaN"));
    }

    #[test]
    fn test_trail_attaches_only_to_deep_errors() {
        use crate::types::verdict::{PipelineState, Tier};

        let trail = vec![TransitionEvent {
            from: PipelineState::Received,
            to: PipelineState::EdgeScored,
            tier: Tier::Edge,
            probability: Some(0.4),
            delay: Duration::ZERO,
        }];

        let failure = PipelineError::deep_failure("remote", "connection reset").with_events(trail.clone());
        assert_eq!(failure.events(), trail.as_slice());

        let schema = PipelineError::schema("V3", "missing").with_events(trail);
        assert!(schema.events().is_empty());
    }
}
