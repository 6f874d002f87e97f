//! Fraud Screening Pipeline Library
//!
//! Two-tier transaction screening: a cheap logistic edge scorer approves or
//! blocks confident cases and escalates uncertain ones to a slower deep tier.

pub mod clock;
pub mod config;
pub mod consumer;
pub mod dataset;
pub mod error;
pub mod feature_extractor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod synthetic;
pub mod types;

pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use error::{PipelineError, Result};
pub use feature_extractor::FeatureExtractor;
pub use models::{DeepScorer, EdgeScorer, ScorerArtifact, Trainer};
pub use pipeline::{DecisionPipeline, DeepTierPolicy, Thresholds};
pub use producer::VerdictProducer;
pub use types::{Decision, FeatureVector, RawTransaction, Verdict};
