//! Deep tier: slower, higher-fidelity scoring for escalated transactions.
//!
//! The deep tier is a strategy behind the [`DeepScorer`] trait. It may answer
//! with a probability (interpreted by the pipeline's deep-tier policy) or with
//! a terminal decision of its own.

use crate::clock::Clock;
use crate::error::Result;
use crate::models::edge::{logit, sigmoid, EdgeScorer};
use crate::types::features::FeatureVector;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default logit sharpening factor of the simulated deep tier
pub const DEFAULT_SHARPENING: f64 = 3.0;

/// Direct decision from a deep scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalDecision {
    Approve,
    Block,
}

/// What a deep scorer returns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeepOutcome {
    Probability(f64),
    Terminal(TerminalDecision),
}

impl DeepOutcome {
    pub fn probability(&self) -> Option<f64> {
        match self {
            DeepOutcome::Probability(p) => Some(*p),
            DeepOutcome::Terminal(_) => None,
        }
    }
}

/// Pluggable deep tier.
///
/// Called at most once per transaction, only after the edge tier escalated it.
/// Implementations may suspend; the pipeline bounds the call with a timeout.
pub trait DeepScorer: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    fn deep_score<'a>(&'a self, features: &'a FeatureVector) -> BoxFuture<'a, Result<DeepOutcome>>;
}

/// Stand-in for an expensive deep module.
///
/// Re-scores with the edge artifact and sharpens the logit by `sharpening`,
/// so the output is more decisive than the edge tier on the same input.
/// Spends `latency` on the injected clock before answering.
#[derive(Debug, Clone)]
pub struct SimulatedDeepScorer {
    edge: EdgeScorer,
    sharpening: f64,
    latency: Duration,
    clock: Arc<dyn Clock>,
}

impl SimulatedDeepScorer {
    pub fn new(edge: EdgeScorer, sharpening: f64, latency: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            edge,
            sharpening,
            latency,
            clock,
        }
    }

    /// Probability without the simulated latency.
    pub fn score_now(&self, features: &FeatureVector) -> f64 {
        let centered = logit(self.edge.predict_proba(features));
        sigmoid(self.sharpening * centered)
    }
}

impl DeepScorer for SimulatedDeepScorer {
    fn name(&self) -> &str {
        "simulated"
    }

    fn deep_score<'a>(&'a self, features: &'a FeatureVector) -> BoxFuture<'a, Result<DeepOutcome>> {
        async move {
            self.clock.sleep(self.latency).await;
            let p = self.score_now(features);
            debug!(deep_probability = p, latency_ms = self.latency.as_millis() as u64, "Simulated deep score");
            Ok(DeepOutcome::Probability(p))
        }
        .boxed()
    }
}

/// Deep scorer with a fixed answer and optional latency.
#[derive(Debug, Clone)]
pub struct StaticDeepScorer {
    outcome: DeepOutcome,
    latency: Duration,
    clock: Option<Arc<dyn Clock>>,
}

impl StaticDeepScorer {
    pub fn new(outcome: DeepOutcome) -> Self {
        Self {
            outcome,
            latency: Duration::ZERO,
            clock: None,
        }
    }

    /// Spend `latency` on `clock` before answering.
    pub fn with_latency(mut self, latency: Duration, clock: Arc<dyn Clock>) -> Self {
        self.latency = latency;
        self.clock = Some(clock);
        self
    }
}

impl DeepScorer for StaticDeepScorer {
    fn name(&self) -> &str {
        "static"
    }

    fn deep_score<'a>(&'a self, _features: &'a FeatureVector) -> BoxFuture<'a, Result<DeepOutcome>> {
        async move {
            if let Some(clock) = &self.clock {
                clock.sleep(self.latency).await;
            }
            Ok(self.outcome)
        }
        .boxed()
    }
}
