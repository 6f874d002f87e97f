//! Type definitions for the screening pipeline

pub mod features;
pub mod transaction;
pub mod verdict;

pub use features::{FeatureVector, TrainingRecord, FEATURE_COUNT, FEATURE_NAMES};
pub use transaction::{LabeledTransaction, RawTransaction};
pub use verdict::{Decision, PipelineState, Tier, TierScore, TransitionEvent, Verdict};
