//! Scoring tiers and the edge model's training

pub mod artifact;
pub mod deep;
pub mod edge;
pub mod trainer;

pub use artifact::ScorerArtifact;
pub use deep::{DeepOutcome, DeepScorer, SimulatedDeepScorer, StaticDeepScorer, TerminalDecision};
pub use edge::EdgeScorer;
pub use trainer::{EvaluationReport, TrainedModel, Trainer};
