//! Verdicts and the state-machine events that produce them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Scoring tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Edge,
    Deep,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Edge => write!(f, "edge"),
            Tier::Deep => write!(f, "deep"),
        }
    }
}

/// States of the escalation state machine.
///
/// `Received → EdgeScored → {Approved | Blocked | Escalated}`, and
/// `Escalated → DeepScored → {EscalatedApproved | EscalatedBlocked}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    EdgeScored,
    Escalated,
    DeepScored,
    Approved,
    Blocked,
    EscalatedApproved,
    EscalatedBlocked,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Approved
                | PipelineState::Blocked
                | PipelineState::EscalatedApproved
                | PipelineState::EscalatedBlocked
        )
    }
}

/// Terminal outcome for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Blocked,
    EscalatedApproved,
    EscalatedBlocked,
}

impl Decision {
    /// Whether the transaction is stopped.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Blocked | Decision::EscalatedBlocked)
    }

    /// Whether the deep tier was consulted.
    pub fn is_escalated(&self) -> bool {
        matches!(self, Decision::EscalatedApproved | Decision::EscalatedBlocked)
    }

    pub fn as_state(&self) -> PipelineState {
        match self {
            Decision::Approved => PipelineState::Approved,
            Decision::Blocked => PipelineState::Blocked,
            Decision::EscalatedApproved => PipelineState::EscalatedApproved,
            Decision::EscalatedBlocked => PipelineState::EscalatedBlocked,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Blocked => "blocked",
            Decision::EscalatedApproved => "escalated_approved",
            Decision::EscalatedBlocked => "escalated_blocked",
        }
    }
}

/// One state transition, as observed by reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub from: PipelineState,
    pub to: PipelineState,
    /// Tier whose output drove the transition
    pub tier: Tier,
    /// Probability produced by that tier, if it produced one
    pub probability: Option<f64>,
    /// Time spent in the tier for this transition
    pub delay: Duration,
}

/// Output of one tier for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierScore {
    pub tier: Tier,
    /// `None` when the tier returned a terminal decision directly
    pub probability: Option<f64>,
    pub elapsed: Duration,
}

/// Final screening outcome for one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Unique verdict identifier
    pub verdict_id: String,

    /// Screened transaction ID
    pub transaction_id: String,

    pub decision: Decision,

    /// Edge tier output (always present)
    pub edge: TierScore,

    /// Deep tier output, present only on escalation
    pub deep: Option<TierScore>,

    /// Full transition trail from `Received` to the terminal state
    pub events: Vec<TransitionEvent>,

    pub decided_at: DateTime<Utc>,
}

impl Verdict {
    pub fn new(
        transaction_id: String,
        decision: Decision,
        edge: TierScore,
        deep: Option<TierScore>,
        events: Vec<TransitionEvent>,
    ) -> Self {
        Self {
            verdict_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            decision,
            edge,
            deep,
            events,
            decided_at: Utc::now(),
        }
    }

    /// Edge probability
    pub fn edge_probability(&self) -> f64 {
        self.edge.probability.unwrap_or_default()
    }

    /// Deep probability, if the deep tier produced one
    pub fn deep_probability(&self) -> Option<f64> {
        self.deep.and_then(|d| d.probability)
    }

    /// Tiers consulted, in order
    pub fn tiers(&self) -> Vec<Tier> {
        let mut tiers = vec![Tier::Edge];
        if self.deep.is_some() {
            tiers.push(Tier::Deep);
        }
        tiers
    }

    /// Total time spent across tiers
    pub fn total_elapsed(&self) -> Duration {
        self.edge.elapsed + self.deep.map(|d| d.elapsed).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(p: f64) -> TierScore {
        TierScore {
            tier: Tier::Edge,
            probability: Some(p),
            elapsed: Duration::from_micros(40),
        }
    }

    #[test]
    fn test_decision_classification() {
        assert!(Decision::Blocked.is_blocked());
        assert!(Decision::EscalatedBlocked.is_blocked());
        assert!(!Decision::EscalatedApproved.is_blocked());
        assert!(Decision::EscalatedApproved.is_escalated());
        assert!(!Decision::Approved.is_escalated());
        assert!(Decision::EscalatedBlocked.as_state().is_terminal());
        assert!(!PipelineState::Escalated.is_terminal());
    }

    #[test]
    fn test_verdict_tiers_and_elapsed() {
        let deep = TierScore {
            tier: Tier::Deep,
            probability: None,
            elapsed: Duration::from_millis(4),
        };
        let verdict = Verdict::new(
            "tx_1".to_string(),
            Decision::EscalatedBlocked,
            edge(0.55),
            Some(deep),
            Vec::new(),
        );

        assert_eq!(verdict.tiers(), vec![Tier::Edge, Tier::Deep]);
        assert_eq!(verdict.deep_probability(), None);
        assert_eq!(verdict.total_elapsed(), Duration::from_micros(4040));
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = Verdict::new(
            "tx_123".to_string(),
            Decision::Approved,
            edge(0.04),
            None,
            vec![TransitionEvent {
                from: PipelineState::EdgeScored,
                to: PipelineState::Approved,
                tier: Tier::Edge,
                probability: Some(0.04),
                delay: Duration::ZERO,
            }],
        );

        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("\"approved\""));
        let back: Verdict = serde_json::from_str(&json).unwrap();

        assert_eq!(back.transaction_id, verdict.transaction_id);
        assert_eq!(back.decision, verdict.decision);
        assert_eq!(back.events, verdict.events);
    }
}
