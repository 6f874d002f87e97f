//! Configuration management for the screening pipeline

use crate::error::Result as PipelineResult;
use crate::pipeline::{DeepTierPolicy, Thresholds};
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Deep tier policy selector as written in the config file
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeepPolicyMode {
    /// Every escalation is blocked
    #[default]
    AlwaysBlock,
    /// Escalations are decided by the deep probability against `deep_block_threshold`
    Threshold,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    pub routing: RoutingConfig,
    pub deep_tier: DeepTierConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject for outgoing verdicts
    pub verdict_subject: String,
}

/// Edge scorer artifact location
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub artifact_path: String,
}

/// Threshold routing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Edge probabilities below this are approved
    pub low_threshold: f64,
    /// Edge probabilities above this are blocked
    pub high_threshold: f64,
    #[serde(default)]
    pub deep_policy: DeepPolicyMode,
    /// Deep probability at or above which escalations are blocked (threshold policy only)
    #[serde(default = "default_deep_block_threshold")]
    pub deep_block_threshold: f64,
}

fn default_deep_block_threshold() -> f64 {
    0.5
}

/// Deep tier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DeepTierConfig {
    /// Time budget for one deep call in milliseconds
    pub timeout_ms: u64,
    /// Latency the simulated deep tier spends per call
    #[serde(default)]
    pub simulated_latency_ms: u64,
    /// Logit sharpening of the simulated deep tier
    #[serde(default = "default_sharpening")]
    pub sharpening: f64,
}

fn default_sharpening() -> f64 {
    crate::models::deep::DEFAULT_SHARPENING
}

/// Edge scorer training configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Labeled dataset (`Time, V1..V28, Amount, Class`)
    pub dataset_path: String,
    /// Fraction of each class held out for evaluation
    pub test_size: f64,
    /// Seed for the stratified split
    pub seed: u64,
    /// Inverse L2 regularization strength
    pub inverse_regularization: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Weight classes inversely to their frequency
    pub balanced_class_weights: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: "creditcard.csv".to_string(),
            test_size: 0.2,
            seed: 42,
            inverse_regularization: 1.0,
            max_iterations: 100,
            tolerance: 1e-8,
            balanced_class_weights: true,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum transactions screened concurrently
    pub workers: usize,
    /// Metrics summary interval
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validated routing thresholds.
    pub fn routing_thresholds(&self) -> PipelineResult<Thresholds> {
        Thresholds::new(self.routing.low_threshold, self.routing.high_threshold)
    }

    /// Validated deep tier policy.
    pub fn deep_policy(&self) -> PipelineResult<DeepTierPolicy> {
        match self.routing.deep_policy {
            DeepPolicyMode::AlwaysBlock => Ok(DeepTierPolicy::AlwaysBlock),
            DeepPolicyMode::Threshold => DeepTierPolicy::threshold(self.routing.deep_block_threshold),
        }
    }

    pub fn deep_timeout(&self) -> Duration {
        Duration::from_millis(self.deep_tier.timeout_ms)
    }

    pub fn deep_latency(&self) -> Duration {
        Duration::from_millis(self.deep_tier.simulated_latency_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                verdict_subject: "fraud.verdicts".to_string(),
            },
            model: ModelConfig {
                artifact_path: "models/edge_scorer.json".to_string(),
            },
            routing: RoutingConfig {
                low_threshold: 0.30,
                high_threshold: 0.90,
                deep_policy: DeepPolicyMode::AlwaysBlock,
                deep_block_threshold: default_deep_block_threshold(),
            },
            deep_tier: DeepTierConfig {
                timeout_ms: 5000,
                simulated_latency_ms: 4000,
                sharpening: default_sharpening(),
            },
            training: TrainingConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: default_metrics_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
