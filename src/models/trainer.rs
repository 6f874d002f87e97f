//! Edge scorer training.
//!
//! Standardizes `Amount`/`Time` on the training split, partitions the corpus
//! with a seeded stratified split, and fits an L2-regularized logistic
//! regression with balanced class weights using Newton's method.

use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use crate::feature_extractor::{FeatureExtractor, Standardizer};
use crate::models::artifact::{ScorerArtifact, TrainingSummary};
use crate::models::edge::{log1p_exp, sigmoid, EdgeScorer};
use crate::pipeline::{Route, Thresholds};
use crate::types::features::{TrainingRecord, FEATURE_COUNT};
use crate::types::transaction::LabeledTransaction;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parameter count: one weight per feature plus the intercept.
const PARAMS: usize = FEATURE_COUNT + 1;

/// Output of a training run
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub artifact: ScorerArtifact,
    pub evaluation: EvaluationReport,
}

/// Held-out evaluation of a trained artifact.
///
/// Classification metrics use a 0.5 cut-off; `routing` shows how the
/// configured thresholds would route the evaluation split.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub records: usize,
    pub fraud: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: Option<f64>,
    pub routing: RoutingSplit,
}

/// Fractions of records per edge route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingSplit {
    pub approved: f64,
    pub blocked: f64,
    pub escalated: f64,
}

/// Trains the edge scorer from labeled transactions.
pub struct Trainer {
    config: TrainingConfig,
    thresholds: Thresholds,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            thresholds: Thresholds::default(),
        }
    }

    /// Routing thresholds used for the evaluation's routing split.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Train on a labeled corpus.
    ///
    /// Fails with `TrainingData` on an empty or single-class corpus, a record
    /// with the wrong field count, or non-finite values.
    pub fn train(&self, corpus: &[LabeledTransaction]) -> Result<TrainedModel> {
        self.validate_config()?;
        validate_corpus(corpus)?;

        let labels: Vec<bool> = corpus.iter().map(|r| r.is_fraud).collect();
        let (train_idx, eval_idx) = stratified_split(&labels, self.config.test_size, self.config.seed);

        let amounts: Vec<f64> = train_idx.iter().map(|&i| corpus[i].transaction.amount).collect();
        let times: Vec<f64> = train_idx.iter().map(|&i| corpus[i].transaction.time).collect();
        let amount_scaler = Standardizer::fit(&amounts);
        let time_scaler = Standardizer::fit(&times);
        let extractor = FeatureExtractor::new(amount_scaler, time_scaler);

        let to_records = |idx: &[usize]| -> Result<Vec<TrainingRecord>> {
            idx.iter()
                .map(|&i| {
                    let features = extractor
                        .extract(&corpus[i].transaction)
                        .map_err(|e| PipelineError::TrainingData(format!("record {}: {}", i, e)))?;
                    Ok(TrainingRecord {
                        features,
                        is_fraud: corpus[i].is_fraud,
                    })
                })
                .collect()
        };
        let train_set = to_records(&train_idx[..])?;
        let eval_set = to_records(&eval_idx[..])?;

        let train_fraud = train_set.iter().filter(|r| r.is_fraud).count();
        let eval_fraud = eval_set.iter().filter(|r| r.is_fraud).count();
        if train_fraud == 0 || train_fraud == train_set.len() {
            return Err(PipelineError::TrainingData(
                "training split contains a single class".to_string(),
            ));
        }

        info!(
            train_records = train_set.len(),
            train_fraud = train_fraud,
            eval_records = eval_set.len(),
            eval_fraud = eval_fraud,
            amount_mean = amount_scaler.mean,
            amount_std = amount_scaler.std,
            "Corpus preprocessed and split"
        );

        let sample_weights = self.sample_weights(&train_set, train_fraud);
        let fit = fit_logistic(
            &train_set,
            &sample_weights,
            self.config.inverse_regularization,
            self.config.max_iterations,
            self.config.tolerance,
        );
        if !fit.converged {
            warn!(
                iterations = fit.iterations,
                max_iterations = self.config.max_iterations,
                "Optimizer did not converge; artifact uses the last iterate"
            );
        }

        let (weights, intercept) = fit.theta.split_at(FEATURE_COUNT);
        let artifact = ScorerArtifact::new(
            weights.to_vec(),
            intercept[0],
            amount_scaler,
            time_scaler,
            TrainingSummary {
                train_records: train_set.len(),
                train_fraud,
                eval_records: eval_set.len(),
                eval_fraud,
                seed: self.config.seed,
                iterations: fit.iterations,
                converged: fit.converged,
            },
        );

        let scorer = EdgeScorer::new(Arc::new(artifact.clone()))?;
        let evaluation = evaluate(&scorer, &eval_set, &self.thresholds);

        info!(
            iterations = fit.iterations,
            converged = fit.converged,
            accuracy = evaluation.accuracy,
            recall = evaluation.recall,
            roc_auc = ?evaluation.roc_auc,
            "Edge scorer trained"
        );

        Ok(TrainedModel {
            artifact,
            evaluation,
        })
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if !(0.0..1.0).contains(&c.test_size) {
            return Err(PipelineError::TrainingData(format!(
                "test_size must be in [0, 1), got {}",
                c.test_size
            )));
        }
        if !(c.inverse_regularization > 0.0 && c.inverse_regularization.is_finite()) {
            return Err(PipelineError::TrainingData(format!(
                "inverse_regularization must be positive, got {}",
                c.inverse_regularization
            )));
        }
        if c.max_iterations == 0 {
            return Err(PipelineError::TrainingData("max_iterations must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Per-record weights. Balanced weighting gives each class `n / (2 * n_class)`.
    fn sample_weights(&self, train_set: &[TrainingRecord], train_fraud: usize) -> Vec<f64> {
        if !self.config.balanced_class_weights {
            return vec![1.0; train_set.len()];
        }

        let n = train_set.len() as f64;
        let fraud_weight = n / (2.0 * train_fraud as f64);
        let legit_weight = n / (2.0 * (train_set.len() - train_fraud) as f64);
        debug!(fraud_weight, legit_weight, "Balanced class weights");

        train_set
            .iter()
            .map(|r| if r.is_fraud { fraud_weight } else { legit_weight })
            .collect()
    }
}

fn validate_corpus(corpus: &[LabeledTransaction]) -> Result<()> {
    if corpus.is_empty() {
        return Err(PipelineError::TrainingData("corpus is empty".to_string()));
    }

    for (i, record) in corpus.iter().enumerate() {
        let tx = &record.transaction;
        tx.validate()
            .map_err(|e| PipelineError::TrainingData(format!("record {}: {}", i, e)))?;
        if !tx.amount.is_finite() || !tx.time.is_finite() || tx.components.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::TrainingData(format!(
                "record {} ({}) has a missing or non-finite value",
                i, tx.transaction_id
            )));
        }
    }

    let fraud = corpus.iter().filter(|r| r.is_fraud).count();
    if fraud == 0 || fraud == corpus.len() {
        return Err(PipelineError::TrainingData(format!(
            "corpus has a single class ({} of {} records are fraud)",
            fraud,
            corpus.len()
        )));
    }
    Ok(())
}

/// Seeded stratified split. Returns sorted `(train, eval)` index sets.
///
/// Each class contributes `round(test_size * n_class)` records to the
/// evaluation split, keeping at least one in training.
pub fn stratified_split(labels: &[bool], test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut eval = Vec::new();

    for class in [false, true] {
        let mut idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        idx.shuffle(&mut rng);

        let n_eval = ((idx.len() as f64) * test_size).round() as usize;
        let n_eval = n_eval.min(idx.len().saturating_sub(1));
        eval.extend_from_slice(&idx[..n_eval]);
        train.extend_from_slice(&idx[n_eval..]);
    }

    train.sort_unstable();
    eval.sort_unstable();
    (train, eval)
}

struct LogisticFit {
    theta: Vec<f64>,
    iterations: usize,
    converged: bool,
}

/// Minimize `0.5 * |w|^2 + C * sum_i s_i * logloss_i` over weights and an
/// unpenalized intercept.
fn fit_logistic(
    records: &[TrainingRecord],
    sample_weights: &[f64],
    c: f64,
    max_iterations: usize,
    tolerance: f64,
) -> LogisticFit {
    let mut theta = vec![0.0; PARAMS];
    let mut loss = objective(records, sample_weights, c, &theta);

    for iteration in 1..=max_iterations {
        let (gradient, hessian) = gradient_and_hessian(records, sample_weights, c, &theta);

        // Fall back to steepest descent if the Hessian is not positive definite.
        let direction = cholesky_solve(hessian, &gradient).unwrap_or_else(|| gradient.clone());
        let slope: f64 = gradient.iter().zip(&direction).map(|(g, d)| g * d).sum();

        let mut step = 1.0;
        let mut candidate = theta.clone();
        let mut candidate_loss = loss;
        for _ in 0..40 {
            for (k, value) in candidate.iter_mut().enumerate() {
                *value = theta[k] - step * direction[k];
            }
            candidate_loss = objective(records, sample_weights, c, &candidate);
            if candidate_loss <= loss - 1e-4 * step * slope {
                break;
            }
            step *= 0.5;
        }

        let max_change = candidate
            .iter()
            .zip(&theta)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        let loss_change = (loss - candidate_loss).abs();

        debug!(iteration, loss = candidate_loss, step, max_change, "Newton iteration");

        if candidate_loss <= loss {
            theta = candidate;
            loss = candidate_loss;
        }

        if max_change < tolerance || loss_change <= tolerance * loss.abs().max(1.0) {
            return LogisticFit {
                theta,
                iterations: iteration,
                converged: true,
            };
        }
    }

    LogisticFit {
        theta,
        iterations: max_iterations,
        converged: false,
    }
}

fn linear(theta: &[f64], record: &TrainingRecord) -> f64 {
    let x = record.features.values();
    theta[FEATURE_COUNT] + x.iter().zip(theta).map(|(xi, wi)| xi * wi).sum::<f64>()
}

fn objective(records: &[TrainingRecord], sample_weights: &[f64], c: f64, theta: &[f64]) -> f64 {
    let penalty = 0.5 * theta[..FEATURE_COUNT].iter().map(|w| w * w).sum::<f64>();
    let data: f64 = records
        .iter()
        .zip(sample_weights)
        .map(|(r, s)| {
            let z = linear(theta, r);
            let y = if r.is_fraud { 1.0 } else { 0.0 };
            s * (log1p_exp(z) - y * z)
        })
        .sum();
    penalty + c * data
}

fn gradient_and_hessian(
    records: &[TrainingRecord],
    sample_weights: &[f64],
    c: f64,
    theta: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let mut gradient = vec![0.0; PARAMS];
    let mut hessian = vec![0.0; PARAMS * PARAMS];
    let mut x = [0.0; PARAMS];
    x[FEATURE_COUNT] = 1.0;

    for (record, &s) in records.iter().zip(sample_weights) {
        x[..FEATURE_COUNT].copy_from_slice(record.features.values());
        let p = sigmoid(linear(theta, record));
        let y = if record.is_fraud { 1.0 } else { 0.0 };
        let residual = c * s * (p - y);
        let curvature = c * s * p * (1.0 - p);

        for j in 0..PARAMS {
            gradient[j] += residual * x[j];
            let row = j * PARAMS;
            for k in 0..=j {
                hessian[row + k] += curvature * x[j] * x[k];
            }
        }
    }

    // Mirror the lower triangle and add the L2 term on the weights.
    for j in 0..PARAMS {
        for k in 0..j {
            hessian[k * PARAMS + j] = hessian[j * PARAMS + k];
        }
    }
    for j in 0..FEATURE_COUNT {
        gradient[j] += theta[j];
        hessian[j * PARAMS + j] += 1.0;
    }
    hessian[FEATURE_COUNT * PARAMS + FEATURE_COUNT] += 1e-12;

    (gradient, hessian)
}

/// Solve `A x = b` for symmetric positive definite `A` (row-major, n x n).
fn cholesky_solve(mut a: Vec<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();

    for j in 0..n {
        let mut d = a[j * n + j];
        for k in 0..j {
            d -= a[j * n + k] * a[j * n + k];
        }
        if !(d > 0.0 && d.is_finite()) {
            return None;
        }
        let d = d.sqrt();
        a[j * n + j] = d;
        for i in (j + 1)..n {
            let mut s = a[i * n + j];
            for k in 0..j {
                s -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = s / d;
        }
    }

    let mut x = b.to_vec();
    for i in 0..n {
        let mut s = x[i];
        for k in 0..i {
            s -= a[i * n + k] * x[k];
        }
        x[i] = s / a[i * n + i];
    }
    for i in (0..n).rev() {
        let mut s = x[i];
        for k in (i + 1)..n {
            s -= a[k * n + i] * x[k];
        }
        x[i] = s / a[i * n + i];
    }
    Some(x)
}

/// Score `records` with `scorer` and summarize.
pub fn evaluate(scorer: &EdgeScorer, records: &[TrainingRecord], thresholds: &Thresholds) -> EvaluationReport {
    if records.is_empty() {
        return EvaluationReport::default();
    }

    let scored: Vec<(f64, bool)> = records
        .iter()
        .map(|r| (scorer.predict_proba(&r.features), r.is_fraud))
        .collect();

    let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
    let (mut approved, mut blocked, mut escalated) = (0usize, 0usize, 0usize);
    for &(p, is_fraud) in &scored {
        match (p >= 0.5, is_fraud) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
        match thresholds.route(p) {
            Route::Approve => approved += 1,
            Route::Block => blocked += 1,
            Route::Escalate => escalated += 1,
        }
    }

    let n = scored.len() as f64;
    let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    EvaluationReport {
        records: scored.len(),
        fraud: tp + fn_,
        accuracy: (tp + tn) as f64 / n,
        precision,
        recall,
        f1,
        roc_auc: roc_auc(&scored),
        routing: RoutingSplit {
            approved: approved as f64 / n,
            blocked: blocked as f64 / n,
            escalated: escalated as f64 / n,
        },
    }
}

/// Rank-based ROC AUC with average ranks for ties. `None` if a class is absent.
fn roc_auc(scored: &[(f64, bool)]) -> Option<f64> {
    let positives = scored.iter().filter(|(_, y)| *y).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut sorted: Vec<(f64, bool)> = scored.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1].0 == sorted[i].0 {
            j += 1;
        }
        // ranks are 1-based; tied block i..=j shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        positive_rank_sum += mean_rank * sorted[i..=j].iter().filter(|(_, y)| *y).count() as f64;
        i = j + 1;
    }

    let p = positives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}
