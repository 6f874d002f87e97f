//! Tiered decision pipeline.
//!
//! Every transaction is scored by the edge tier and routed on its probability:
//!
//! ```text
//! Received -> EdgeScored -> Approved             (p <  low)
//!                        -> Blocked              (p >  high)
//!                        -> Escalated            (low <= p <= high)
//!                             -> DeepScored -> EscalatedApproved | EscalatedBlocked
//! ```
//!
//! Boundary values escalate. Steps within one transaction are sequential; the
//! deep call is the only await point and runs under a time budget. The
//! pipeline holds only immutable, shared state, so any number of
//! transactions may be screened concurrently.

use crate::clock::{Clock, SystemClock};
use crate::error::{PipelineError, Result};
use crate::models::deep::{DeepOutcome, DeepScorer, SimulatedDeepScorer, TerminalDecision, DEFAULT_SHARPENING};
use crate::models::edge::EdgeScorer;
use crate::types::features::FeatureVector;
use crate::types::transaction::RawTransaction;
use crate::types::verdict::{Decision, PipelineState, Tier, TierScore, TransitionEvent, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default deep tier time budget
pub const DEFAULT_DEEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Validated routing bounds: `0 <= low < high <= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    low: f64,
    high: f64,
}

impl Thresholds {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let invalid = |reason: &str| PipelineError::InvalidThreshold {
            low,
            high,
            reason: reason.to_string(),
        };

        if !low.is_finite() || !high.is_finite() {
            return Err(invalid("thresholds must be finite"));
        }
        if low < 0.0 || high > 1.0 {
            return Err(invalid("thresholds must lie in [0, 1]"));
        }
        if low >= high {
            return Err(invalid("low threshold must be strictly below high threshold"));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Route an edge probability.
    pub fn route(&self, p: f64) -> Route {
        if p < self.low {
            Route::Approve
        } else if p > self.high {
            Route::Block
        } else {
            Route::Escalate
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { low: 0.30, high: 0.90 }
    }
}

/// Edge routing outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Approve,
    Block,
    Escalate,
}

/// How an escalated transaction's deep outcome becomes a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum DeepTierPolicy {
    /// Every escalation ends in `EscalatedBlocked`, whatever the deep tier says.
    #[default]
    AlwaysBlock,
    /// Block when the deep probability is at or above `block_threshold`;
    /// terminal decisions from the deep tier are taken as-is.
    ThresholdOnDeepProbability { block_threshold: f64 },
}

impl DeepTierPolicy {
    /// Threshold policy with a validated cut-off.
    pub fn threshold(block_threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&block_threshold) {
            return Err(PipelineError::InvalidThreshold {
                low: block_threshold,
                high: block_threshold,
                reason: "deep block threshold must lie in [0, 1]".to_string(),
            });
        }
        Ok(Self::ThresholdOnDeepProbability { block_threshold })
    }

    pub fn decide(&self, outcome: &DeepOutcome) -> Decision {
        match (self, outcome) {
            (DeepTierPolicy::AlwaysBlock, _) => Decision::EscalatedBlocked,
            (_, DeepOutcome::Terminal(TerminalDecision::Block)) => Decision::EscalatedBlocked,
            (_, DeepOutcome::Terminal(TerminalDecision::Approve)) => Decision::EscalatedApproved,
            (DeepTierPolicy::ThresholdOnDeepProbability { block_threshold }, DeepOutcome::Probability(p)) => {
                if *p >= *block_threshold {
                    Decision::EscalatedBlocked
                } else {
                    Decision::EscalatedApproved
                }
            }
        }
    }
}

/// Builder for [`DecisionPipeline`]. All validation happens in `build`.
#[derive(Default)]
pub struct PipelineBuilder {
    edge: Option<EdgeScorer>,
    deep: Option<Arc<dyn DeepScorer>>,
    low_threshold: Option<f64>,
    high_threshold: Option<f64>,
    policy: DeepTierPolicy,
    deep_timeout: Option<Duration>,
    clock: Option<Arc<dyn Clock>>,
}

impl PipelineBuilder {
    pub fn edge(mut self, edge: EdgeScorer) -> Self {
        self.edge = Some(edge);
        self
    }

    pub fn deep(mut self, deep: Arc<dyn DeepScorer>) -> Self {
        self.deep = Some(deep);
        self
    }

    pub fn thresholds(mut self, low: f64, high: f64) -> Self {
        self.low_threshold = Some(low);
        self.high_threshold = Some(high);
        self
    }

    pub fn policy(mut self, policy: DeepTierPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn deep_timeout(mut self, timeout: Duration) -> Self {
        self.deep_timeout = Some(timeout);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and assemble.
    ///
    /// Fails with `ArtifactNotLoaded` without an edge scorer, and with
    /// `InvalidThreshold` on bad routing bounds or a zero deep timeout.
    /// Without an explicit deep tier, a [`SimulatedDeepScorer`] over the edge
    /// artifact is used.
    pub fn build(self) -> Result<DecisionPipeline> {
        let edge = self.edge.ok_or_else(|| PipelineError::ArtifactNotLoaded {
            reason: "pipeline built without an edge scorer artifact".to_string(),
        })?;

        let defaults = Thresholds::default();
        let thresholds = Thresholds::new(
            self.low_threshold.unwrap_or(defaults.low),
            self.high_threshold.unwrap_or(defaults.high),
        )?;
        if let DeepTierPolicy::ThresholdOnDeepProbability { block_threshold } = self.policy {
            DeepTierPolicy::threshold(block_threshold)?;
        }

        let deep_timeout = self.deep_timeout.unwrap_or(DEFAULT_DEEP_TIMEOUT);
        if deep_timeout.is_zero() {
            return Err(PipelineError::InvalidThreshold {
                low: thresholds.low,
                high: thresholds.high,
                reason: "deep tier timeout must be non-zero".to_string(),
            });
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::new()),
        };
        let deep: Arc<dyn DeepScorer> = match self.deep {
            Some(deep) => deep,
            None => Arc::new(SimulatedDeepScorer::new(
                edge.clone(),
                DEFAULT_SHARPENING,
                Duration::ZERO,
                clock.clone(),
            )),
        };

        info!(
            low_threshold = thresholds.low,
            high_threshold = thresholds.high,
            policy = ?self.policy,
            deep_tier = deep.name(),
            deep_timeout_ms = deep_timeout.as_millis() as u64,
            "Decision pipeline configured"
        );

        Ok(DecisionPipeline {
            edge,
            deep,
            thresholds,
            policy: self.policy,
            deep_timeout,
            clock,
        })
    }
}

/// Screens transactions through the edge tier and, when uncertain, the deep tier.
#[derive(Clone)]
pub struct DecisionPipeline {
    edge: EdgeScorer,
    deep: Arc<dyn DeepScorer>,
    thresholds: Thresholds,
    policy: DeepTierPolicy,
    deep_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl DecisionPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn policy(&self) -> &DeepTierPolicy {
        &self.policy
    }

    pub fn edge(&self) -> &EdgeScorer {
        &self.edge
    }

    /// Screen a raw transaction, standardizing `Amount`/`Time` with the
    /// artifact's parameters first.
    pub async fn screen_raw(&self, tx: &RawTransaction) -> Result<Verdict> {
        let features = self.edge.extract(tx)?;
        self.screen(&tx.transaction_id, &features).await
    }

    /// Screen one transaction.
    ///
    /// A deep tier timeout or failure carries the transitions taken so far.
    pub async fn screen(&self, transaction_id: &str, features: &FeatureVector) -> Result<Verdict> {
        let mut events = Vec::with_capacity(4);

        let started = self.clock.now();
        let edge_p = self.edge.score(features)?;
        let edge = TierScore {
            tier: Tier::Edge,
            probability: Some(edge_p),
            elapsed: self.clock.now().saturating_sub(started),
        };
        record(
            transaction_id,
            &mut events,
            TransitionEvent {
                from: PipelineState::Received,
                to: PipelineState::EdgeScored,
                tier: Tier::Edge,
                probability: Some(edge_p),
                delay: edge.elapsed,
            },
        );

        let route = self.thresholds.route(edge_p);
        let routed_to = match route {
            Route::Approve => PipelineState::Approved,
            Route::Block => PipelineState::Blocked,
            Route::Escalate => PipelineState::Escalated,
        };
        record(
            transaction_id,
            &mut events,
            TransitionEvent {
                from: PipelineState::EdgeScored,
                to: routed_to,
                tier: Tier::Edge,
                probability: Some(edge_p),
                delay: Duration::ZERO,
            },
        );

        match route {
            Route::Approve => {
                return Ok(Verdict::new(transaction_id.to_string(), Decision::Approved, edge, None, events));
            }
            Route::Block => {
                info!(transaction_id = %transaction_id, edge_probability = edge_p, "Blocked at edge");
                return Ok(Verdict::new(transaction_id.to_string(), Decision::Blocked, edge, None, events));
            }
            Route::Escalate => {
                debug!(
                    transaction_id = %transaction_id,
                    edge_probability = edge_p,
                    deep_tier = self.deep.name(),
                    "Escalating to deep tier"
                );
            }
        }

        let (outcome, deep_elapsed) = match self.run_deep(transaction_id, features, edge_p).await {
            Ok(scored) => scored,
            Err(e) => return Err(e.with_events(events)),
        };
        let deep = TierScore {
            tier: Tier::Deep,
            probability: outcome.probability(),
            elapsed: deep_elapsed,
        };
        record(
            transaction_id,
            &mut events,
            TransitionEvent {
                from: PipelineState::Escalated,
                to: PipelineState::DeepScored,
                tier: Tier::Deep,
                probability: deep.probability,
                delay: deep_elapsed,
            },
        );

        let decision = self.policy.decide(&outcome);
        record(
            transaction_id,
            &mut events,
            TransitionEvent {
                from: PipelineState::DeepScored,
                to: decision.as_state(),
                tier: Tier::Deep,
                probability: deep.probability,
                delay: Duration::ZERO,
            },
        );

        info!(
            transaction_id = %transaction_id,
            edge_probability = edge_p,
            deep_probability = ?deep.probability,
            deep_elapsed_ms = deep_elapsed.as_millis() as u64,
            decision = decision.label(),
            "Escalated transaction decided"
        );

        Ok(Verdict::new(transaction_id.to_string(), decision, edge, Some(deep), events))
    }

    /// Screen a batch concurrently. Results keep input order.
    pub async fn screen_batch(&self, batch: &[(String, FeatureVector)]) -> Vec<Result<Verdict>> {
        futures::future::join_all(batch.iter().map(|(id, fv)| self.screen(id, fv))).await
    }

    /// Invoke the deep tier once, under the time budget.
    async fn run_deep(
        &self,
        transaction_id: &str,
        features: &FeatureVector,
        edge_probability: f64,
    ) -> Result<(DeepOutcome, Duration)> {
        let started = self.clock.now();
        let timed_out = |elapsed: Duration| {
            warn!(
                transaction_id = %transaction_id,
                edge_probability,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.deep_timeout.as_millis() as u64,
                "Deep tier timed out"
            );
            PipelineError::DeepTierTimeout {
                budget: self.deep_timeout,
                elapsed,
                edge_probability,
                events: Vec::new(),
            }
        };

        let result = tokio::time::timeout(self.deep_timeout, self.deep.deep_score(features)).await;
        let elapsed = self.clock.now().saturating_sub(started);

        let outcome = match result {
            Err(_) => return Err(timed_out(elapsed.max(self.deep_timeout))),
            Ok(Err(e)) => {
                return Err(match e {
                    e @ (PipelineError::DeepTierFailure { .. } | PipelineError::DeepTierTimeout { .. }) => e,
                    other => PipelineError::deep_failure(self.deep.name(), other.to_string()),
                })
            }
            Ok(Ok(outcome)) => outcome,
        };

        if elapsed > self.deep_timeout {
            return Err(timed_out(elapsed));
        }
        if let DeepOutcome::Probability(p) = outcome {
            if !(0.0..=1.0).contains(&p) {
                return Err(PipelineError::deep_failure(
                    self.deep.name(),
                    format!("probability {} outside [0, 1]", p),
                ));
            }
        }

        Ok((outcome, elapsed))
    }
}

/// Append a transition to the trail, logging it as it happens.
fn record(transaction_id: &str, events: &mut Vec<TransitionEvent>, event: TransitionEvent) {
    debug!(
        transaction_id = %transaction_id,
        from = ?event.from,
        to = ?event.to,
        tier = %event.tier,
        probability = ?event.probability,
        delay_us = event.delay.as_micros() as u64,
        "State transition"
    );
    events.push(event);
}
