//! Feature extraction for edge scorer inference.
//!
//! Turns raw transactions into [`FeatureVector`]s in the canonical schema
//! order. `Amount` and `Time` are standardized with parameters fitted on the
//! training split and carried in the artifact; they are never refitted on
//! inference data.

use crate::error::Result;
use crate::types::features::{FeatureVector, FEATURE_COUNT, SCALED_AMOUNT_INDEX, SCALED_TIME_INDEX};
use crate::types::transaction::RawTransaction;
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance scaling for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub mean: f64,
    /// Population standard deviation. Stored as 1.0 for constant columns.
    pub std: f64,
}

impl Standardizer {
    /// Fit on a column. Constant (or single-value) columns get `std = 1.0`.
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::identity();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        Self {
            mean,
            std: if std > f64::EPSILON { std } else { 1.0 },
        }
    }

    pub fn identity() -> Self {
        Self { mean: 0.0, std: 1.0 }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// Converts raw transactions into model-space feature vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureExtractor {
    amount: Standardizer,
    time: Standardizer,
}

impl FeatureExtractor {
    pub fn new(amount: Standardizer, time: Standardizer) -> Self {
        Self { amount, time }
    }

    /// Extract features from a transaction.
    ///
    /// Fails with `SchemaMismatch` if the transaction does not carry exactly
    /// 28 components, or any value is not finite.
    pub fn extract(&self, tx: &RawTransaction) -> Result<FeatureVector> {
        tx.validate()?;

        let mut values = [0.0; FEATURE_COUNT];
        values[..tx.components.len()].copy_from_slice(&tx.components);
        values[SCALED_AMOUNT_INDEX] = self.amount.transform(tx.amount);
        values[SCALED_TIME_INDEX] = self.time.transform(tx.time);

        FeatureVector::from_values(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_standardizer_fit() {
        let s = Standardizer::fit(&[1.0, 2.0, 3.0, 4.0]);
        assert!((s.mean - 2.5).abs() < 1e-12);
        // population std of 1..4
        assert!((s.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert!((s.transform(2.5)).abs() < 1e-12);
    }

    #[test]
    fn test_standardizer_constant_column() {
        let s = Standardizer::fit(&[7.0, 7.0, 7.0]);
        assert_eq!(s.std, 1.0);
        assert_eq!(s.transform(7.0), 0.0);
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new(
            Standardizer { mean: 100.0, std: 50.0 },
            Standardizer { mean: 1000.0, std: 500.0 },
        );
        let tx = RawTransaction::new("test_001", 1500.0, 200.0).with_component(17, -3.0);

        let features = extractor.extract(&tx).unwrap();

        assert_eq!(features.get("V17"), Some(-3.0));
        assert_eq!(features.get("scaled_amount"), Some(2.0));
        assert_eq!(features.get("scaled_time"), Some(1.0));
        assert_eq!(features.values().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_extraction_rejects_wrong_component_count() {
        let extractor = FeatureExtractor::new(Standardizer::identity(), Standardizer::identity());
        let tx = RawTransaction::new("bad", 0.0, 0.0).with_components(vec![0.0; 30]);

        assert!(matches!(
            extractor.extract(&tx),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_extraction_rejects_nan_amount() {
        let extractor = FeatureExtractor::new(Standardizer::identity(), Standardizer::identity());
        let tx = RawTransaction::new("nan", 0.0, f64::NAN);

        match extractor.extract(&tx) {
            Err(PipelineError::SchemaMismatch { field, .. }) => assert_eq!(field, "scaled_amount"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
