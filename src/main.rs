//! Fraud Screening Pipeline - Main Entry Point
//!
//! Consumes raw transactions from NATS, screens each through the edge tier
//! (escalating uncertain ones to the deep tier) and publishes verdicts.
//! Transactions are screened concurrently, bounded by the worker count.

use anyhow::{Context, Result};
use fraud_screening_pipeline::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    consumer::{decode, TransactionConsumer},
    error::PipelineError,
    logging::init_logging,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{DeepScorer, EdgeScorer, SimulatedDeepScorer},
    pipeline::DecisionPipeline,
    producer::VerdictProducer,
};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/config.toml"));
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_logging(&config.logging)?;
    info!("Starting Fraud Screening Pipeline");
    info!(config = %config_path.display(), "Configuration loaded successfully");

    // Setup errors are fatal: no artifact, bad thresholds, bad policy
    let edge = EdgeScorer::from_path(&config.model.artifact_path)
        .with_context(|| format!("Failed to load edge artifact {}", config.model.artifact_path))?;
    info!(
        artifact = %config.model.artifact_path,
        trained_at = %edge.artifact().trained_at,
        train_records = edge.artifact().summary.train_records,
        features = edge.artifact().feature_names.len(),
        "Edge scorer loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let deep: Arc<dyn DeepScorer> = Arc::new(SimulatedDeepScorer::new(
        edge.clone(),
        config.deep_tier.sharpening,
        config.deep_latency(),
        clock.clone(),
    ));
    let thresholds = config.routing_thresholds()?;
    let pipeline = DecisionPipeline::builder()
        .edge(edge)
        .deep(deep)
        .thresholds(thresholds.low(), thresholds.high())
        .policy(config.deep_policy()?)
        .deep_timeout(config.deep_timeout())
        .clock(clock)
        .build()?;
    let pipeline = Arc::new(pipeline);

    let metrics = Arc::new(PipelineMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject);
    let producer = Arc::new(VerdictProducer::new(client.clone(), &config.nats.verdict_subject));

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        transactions = %consumer.subject(),
        verdicts = %producer.subject(),
        "Starting screening loop"
    );

    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let transaction = match decode(&message.payload) {
                Ok(tx) => tx,
                Err(e) => {
                    metrics.record_decode_failure();
                    warn!(error = %e, "Dropping undecodable transaction");
                    drop(permit);
                    return;
                }
            };
            let tx_id = transaction.transaction_id.clone();

            match pipeline.screen_raw(&transaction).await {
                Ok(verdict) => {
                    metrics.record_verdict(&verdict);

                    if let Err(e) = producer.publish(&verdict).await {
                        error!(transaction_id = %tx_id, error = %e, "Failed to publish verdict");
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 0 {
                        info!(
                            processed = count,
                            throughput = format!("{:.1} tx/s", metrics.throughput()),
                            escalation_rate = format!("{:.1}%", metrics.escalation_rate() * 100.0),
                            avg_edge_latency_us = metrics.edge_latency().mean_us,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    metrics.record_error(&e);
                    match &e {
                        PipelineError::DeepTierFailure { .. } => {
                            error!(transaction_id = %tx_id, error = %e, "Deep tier failed");
                        }
                        e if e.is_per_transaction() => {
                            warn!(transaction_id = %tx_id, error = %e, "Transaction not screened");
                        }
                        e => error!(transaction_id = %tx_id, error = %e, "Screening failed"),
                    }
                }
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
