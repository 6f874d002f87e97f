//! Edge Model Trainer
//!
//! Trains the edge scorer on the labeled credit-card dataset, reports its
//! held-out evaluation and writes the JSON artifact the pipeline loads.

use anyhow::{Context, Result};
use clap::Parser;
use fraud_screening_pipeline::{
    config::AppConfig, dataset, logging::init_logging, models::Trainer,
    synthetic::TransactionGenerator,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Train the edge logistic scorer.
#[derive(Parser, Debug)]
#[command(name = "train-edge-model", version, about)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Dataset CSV (overrides `training.dataset_path`)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Artifact output path (overrides `model.artifact_path`)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Split seed (overrides `training.seed`)
    #[arg(long)]
    seed: Option<u64>,

    /// Train on a synthetic corpus of this many records instead of the dataset
    #[arg(long)]
    synthetic: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_from_path(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    init_logging(&config.logging)?;

    let mut training = config.training.clone();
    if let Some(seed) = args.seed {
        training.seed = seed;
    }
    let dataset_path = args
        .dataset
        .clone()
        .unwrap_or_else(|| PathBuf::from(&training.dataset_path));
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.model.artifact_path));

    let corpus = match args.synthetic {
        Some(total) => {
            // roughly the real dataset's imbalance, with enough fraud to split
            let n_fraud = (total / 50).max(10);
            let n_legit = total.saturating_sub(n_fraud);
            warn!(n_legit, n_fraud, seed = training.seed, "Training on a synthetic corpus");
            TransactionGenerator::with_seed(training.seed).labeled_corpus(n_legit, n_fraud)
        }
        None => dataset::load_csv(&dataset_path)?,
    };

    let trainer = Trainer::new(training).with_thresholds(config.routing_thresholds()?);
    let trained = trainer.train(&corpus)?;
    let report = &trained.evaluation;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║                EDGE SCORER - EVALUATION REPORT               ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║ Held-out records: {:>8}  │  Fraud: {:>6}                  ║", report.records, report.fraud);
    info!(
        "║ Accuracy: {:>6.4}  Precision: {:>6.4}  Recall: {:>6.4}        ║",
        report.accuracy, report.precision, report.recall
    );
    match report.roc_auc {
        Some(auc) => info!("║ F1: {:>6.4}  ROC AUC: {:>6.4}                               ║", report.f1, auc),
        None => info!("║ F1: {:>6.4}  ROC AUC: n/a                                   ║", report.f1),
    }
    info!(
        "║ Routing: approve {:>5.1}%  block {:>5.1}%  escalate {:>5.1}%      ║",
        report.routing.approved * 100.0,
        report.routing.blocked * 100.0,
        report.routing.escalated * 100.0
    );
    info!("╚══════════════════════════════════════════════════════════════╝");

    trained.artifact.save(&output)?;
    info!(
        path = %output.display(),
        iterations = trained.artifact.summary.iterations,
        converged = trained.artifact.summary.converged,
        "Edge artifact written"
    );

    Ok(())
}
