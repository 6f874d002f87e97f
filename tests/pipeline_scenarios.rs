//! End-to-end screening scenarios on a model trained from a seeded synthetic corpus.

use fraud_screening_pipeline::clock::{Clock, ManualClock};
use fraud_screening_pipeline::config::TrainingConfig;
use fraud_screening_pipeline::error::PipelineError;
use fraud_screening_pipeline::models::{
    DeepOutcome, DeepScorer, EdgeScorer, ScorerArtifact, SimulatedDeepScorer, StaticDeepScorer, Trainer,
};
use fraud_screening_pipeline::pipeline::{DecisionPipeline, DeepTierPolicy};
use fraud_screening_pipeline::synthetic::TransactionGenerator;
use fraud_screening_pipeline::types::features::feature_index;
use fraud_screening_pipeline::types::{Decision, FeatureVector, PipelineState, RawTransaction, Tier};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn trained_artifact() -> ScorerArtifact {
    let corpus = TransactionGenerator::with_seed(11).labeled_corpus(1000, 80);
    Trainer::new(TrainingConfig::default())
        .train(&corpus)
        .unwrap()
        .artifact
}

fn edge() -> EdgeScorer {
    EdgeScorer::new(Arc::new(trained_artifact())).unwrap()
}

fn pipeline(edge: EdgeScorer) -> DecisionPipeline {
    DecisionPipeline::builder().edge(edge).build().unwrap()
}

/// Profile with the edge probability exactly at the decision boundary
fn midpoint_profile(edge: &EdgeScorer) -> FeatureVector {
    let artifact = edge.artifact();
    let w14 = artifact.weights[feature_index("V14").unwrap()];
    FeatureVector::zeros()
        .with("V14", -artifact.intercept / w14)
        .unwrap()
}

fn strong_fraud() -> RawTransaction {
    RawTransaction::new("tx_fraud", 5_000.0, 250.0)
        .with_component(10, -5.0)
        .with_component(12, -6.0)
        .with_component(14, -8.0)
        .with_component(17, -7.0)
}

#[tokio::test]
async fn test_typical_transaction_is_approved_at_edge() {
    let pipeline = pipeline(edge());
    let verdict = pipeline.screen("tx_zero", &FeatureVector::zeros()).await.unwrap();

    assert!(verdict.edge_probability() < 0.30);
    assert_eq!(verdict.decision, Decision::Approved);
    assert_eq!(verdict.tiers(), vec![Tier::Edge]);
    assert!(verdict.deep.is_none());
}

#[tokio::test]
async fn test_fraud_profile_is_blocked_at_edge() {
    let pipeline = pipeline(edge());
    let verdict = pipeline.screen_raw(&strong_fraud()).await.unwrap();

    assert!(verdict.edge_probability() > 0.90);
    assert_eq!(verdict.decision, Decision::Blocked);
    assert_eq!(verdict.transaction_id, "tx_fraud");
    assert_eq!(verdict.events.last().unwrap().to, PipelineState::Blocked);
}

#[tokio::test]
async fn test_uncertain_transaction_is_escalated_and_blocked() {
    let edge = edge();
    let clock = Arc::new(ManualClock::new());
    let deep: Arc<dyn DeepScorer> = Arc::new(SimulatedDeepScorer::new(
        edge.clone(),
        3.0,
        Duration::from_millis(4000),
        clock.clone(),
    ));
    let pipeline = DecisionPipeline::builder()
        .edge(edge.clone())
        .deep(deep)
        .clock(clock.clone())
        .build()
        .unwrap();

    let features = midpoint_profile(&edge);
    let verdict = pipeline.screen("tx_mid", &features).await.unwrap();

    assert!((verdict.edge_probability() - 0.5).abs() < 1e-9);
    assert_eq!(verdict.decision, Decision::EscalatedBlocked);
    assert_eq!(verdict.tiers(), vec![Tier::Edge, Tier::Deep]);

    let states: Vec<PipelineState> = verdict.events.iter().map(|e| e.to).collect();
    assert_eq!(
        states,
        vec![
            PipelineState::EdgeScored,
            PipelineState::Escalated,
            PipelineState::DeepScored,
            PipelineState::EscalatedBlocked,
        ]
    );
    assert_eq!(verdict.deep.unwrap().elapsed, Duration::from_millis(4000));
    assert_eq!(clock.now(), Duration::from_millis(4000));
}

#[tokio::test]
async fn test_threshold_policy_uses_deep_probability() {
    let edge = edge();
    let pipeline = DecisionPipeline::builder()
        .edge(edge.clone())
        .deep(Arc::new(StaticDeepScorer::new(DeepOutcome::Probability(0.2))))
        .policy(DeepTierPolicy::threshold(0.5).unwrap())
        .build()
        .unwrap();

    let verdict = pipeline.screen("tx_mid", &midpoint_profile(&edge)).await.unwrap();
    assert_eq!(verdict.decision, Decision::EscalatedApproved);
    assert_eq!(verdict.deep_probability(), Some(0.2));
}

#[tokio::test]
async fn test_slow_deep_tier_times_out() {
    let edge = edge();
    let clock = Arc::new(ManualClock::new());
    let slow = StaticDeepScorer::new(DeepOutcome::Probability(0.7))
        .with_latency(Duration::from_secs(6), clock.clone());
    let pipeline = DecisionPipeline::builder()
        .edge(edge.clone())
        .deep(Arc::new(slow))
        .deep_timeout(Duration::from_secs(5))
        .clock(clock)
        .build()
        .unwrap();

    let err = pipeline.screen("tx_slow", &midpoint_profile(&edge)).await.unwrap_err();
    assert!(matches!(err, PipelineError::DeepTierTimeout { .. }));
    assert!(err.is_per_transaction());

    let states: Vec<PipelineState> = err.events().iter().map(|e| e.to).collect();
    assert_eq!(states, vec![PipelineState::EdgeScored, PipelineState::Escalated]);
}

#[tokio::test]
async fn test_saved_artifact_scores_identically() {
    let artifact = trained_artifact();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("edge_scorer.json");
    artifact.save(&path).unwrap();

    let original = EdgeScorer::new(Arc::new(artifact)).unwrap();
    let loaded = EdgeScorer::from_path(&path).unwrap();

    let mut generator = TransactionGenerator::with_seed(99);
    for tx in (0..20).map(|i| if i % 4 == 0 { generator.fraudulent() } else { generator.legitimate() }) {
        let a = original.predict_raw(&tx).unwrap();
        let b = loaded.predict_raw(&tx).unwrap();
        assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
    }
}

#[tokio::test]
async fn test_pipelines_loaded_from_one_artifact_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edge_scorer.json");
    trained_artifact().save(&path).unwrap();

    let first = pipeline(EdgeScorer::from_path(&path).unwrap());
    let second = pipeline(EdgeScorer::from_path(&path).unwrap());

    let mut generator = TransactionGenerator::with_seed(5);
    for tx in (0..12).map(|i| if i % 3 == 0 { generator.fraudulent() } else { generator.legitimate() }) {
        let a = first.screen_raw(&tx).await.unwrap();
        let b = second.screen_raw(&tx).await.unwrap();
        assert_eq!(a.decision, b.decision);
        assert_eq!(a.edge_probability(), b.edge_probability());
    }
}

#[tokio::test]
async fn test_concurrent_batch_matches_sequential() {
    let edge = edge();
    let pipeline = pipeline(edge.clone());

    let batch: Vec<(String, FeatureVector)> = vec![
        ("zero".to_string(), FeatureVector::zeros()),
        ("mid".to_string(), midpoint_profile(&edge)),
        ("fraud".to_string(), edge.extract(&strong_fraud()).unwrap()),
    ];
    let verdicts = pipeline.screen_batch(&batch).await;

    let decisions: Vec<Decision> = verdicts.into_iter().map(|v| v.unwrap().decision).collect();
    assert_eq!(
        decisions,
        vec![Decision::Approved, Decision::EscalatedBlocked, Decision::Blocked]
    );
}

#[tokio::test]
async fn test_missing_component_is_schema_mismatch() {
    let pipeline = pipeline(edge());
    let short = RawTransaction::new("tx_short", 0.0, 10.0).with_components(vec![0.0; 27]);

    match pipeline.screen_raw(&short).await.unwrap_err() {
        PipelineError::SchemaMismatch { field, .. } => assert_eq!(field, "V28"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_incomplete_feature_map_is_schema_mismatch() {
    let mut map: HashMap<String, f64> = (1..=28).map(|i| (format!("V{}", i), 0.0)).collect();
    map.insert("scaled_amount".to_string(), 0.0);

    assert!(matches!(
        FeatureVector::from_map(&map),
        Err(PipelineError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_invalid_thresholds_rejected_at_build() {
    for (low, high) in [(0.9, 0.3), (0.5, 0.5)] {
        let result = DecisionPipeline::builder().edge(edge()).thresholds(low, high).build();
        assert!(matches!(result, Err(PipelineError::InvalidThreshold { .. })));
    }
}

#[test]
fn test_pipeline_without_artifact_rejected() {
    assert!(matches!(
        DecisionPipeline::builder().build(),
        Err(PipelineError::ArtifactNotLoaded { .. })
    ));
}
