//! Canonical feature schema for the edge scorer.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of features in the canonical schema.
pub const FEATURE_COUNT: usize = 30;

/// Number of anonymized PCA components (`V1`..`V28`).
pub const COMPONENT_COUNT: usize = 28;

/// Canonical feature order. The artifact's weights are indexed by this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11", "V12", "V13", "V14",
    "V15", "V16", "V17", "V18", "V19", "V20", "V21", "V22", "V23", "V24", "V25", "V26", "V27",
    "V28", "scaled_amount", "scaled_time",
];

/// Position of `scaled_amount` in the schema.
pub const SCALED_AMOUNT_INDEX: usize = 28;

/// Position of `scaled_time` in the schema.
pub const SCALED_TIME_INDEX: usize = 29;

/// Look up a feature's schema position by name.
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|&n| n == name)
}

/// One transaction in model space: all 30 features, in schema order.
///
/// `scaled_amount` and `scaled_time` already hold standardized values.
/// Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// All-zero profile. Use [`FeatureVector::with`] to set individual features.
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }

    /// Build from positional values in schema order.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.len() != FEATURE_COUNT {
            let field = FEATURE_NAMES
                .get(values.len())
                .copied()
                .unwrap_or("<extra>");
            return Err(PipelineError::schema(
                field,
                format!("expected {} features, got {}", FEATURE_COUNT, values.len()),
            ));
        }

        let mut out = [0.0; FEATURE_COUNT];
        for (i, &v) in values.iter().enumerate() {
            out[i] = check_finite(FEATURE_NAMES[i], v)?;
        }
        Ok(Self { values: out })
    }

    /// Build from named columns. Names must equal the schema, in schema order.
    pub fn from_columns(names: &[&str], values: &[f64]) -> Result<Self> {
        if names.len() != values.len() {
            return Err(PipelineError::schema(
                "<columns>",
                format!("{} names for {} values", names.len(), values.len()),
            ));
        }
        for (i, expected) in FEATURE_NAMES.iter().enumerate() {
            match names.get(i) {
                Some(name) if name == expected => {}
                Some(name) => {
                    return Err(PipelineError::schema(
                        *expected,
                        format!("column {} is `{}`, expected `{}`", i, name, expected),
                    ))
                }
                None => return Err(PipelineError::schema(*expected, "missing column")),
            }
        }
        if let Some(extra) = names.get(FEATURE_COUNT) {
            return Err(PipelineError::schema(*extra, "unexpected column"));
        }
        Self::from_values(values)
    }

    /// Build from a name → value map. Every schema field must be present.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self> {
        if let Some(unknown) = map.keys().find(|k| feature_index(k).is_none()) {
            return Err(PipelineError::schema(unknown.as_str(), "unknown feature"));
        }

        let mut out = [0.0; FEATURE_COUNT];
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            let v = map
                .get(*name)
                .copied()
                .ok_or_else(|| PipelineError::schema(*name, "missing required feature"))?;
            out[i] = check_finite(name, v)?;
        }
        Ok(Self { values: out })
    }

    /// Return a copy with one feature replaced.
    pub fn with(mut self, name: &str, value: f64) -> Result<Self> {
        let idx = feature_index(name).ok_or_else(|| PipelineError::schema(name, "unknown feature"))?;
        self.values[idx] = check_finite(name, value)?;
        Ok(self)
    }

    /// Value of a named feature.
    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    /// Values in schema order.
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = PipelineError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::from_values(&values)
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(fv: FeatureVector) -> Self {
        fv.values.to_vec()
    }
}

/// A labeled feature vector, as consumed by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingRecord {
    pub features: FeatureVector,
    pub is_fraud: bool,
}

fn check_finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PipelineError::schema(field, format!("value {} is not finite", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_layout() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        assert_eq!(FEATURE_NAMES[0], "V1");
        assert_eq!(FEATURE_NAMES[27], "V28");
        assert_eq!(FEATURE_NAMES[SCALED_AMOUNT_INDEX], "scaled_amount");
        assert_eq!(FEATURE_NAMES[SCALED_TIME_INDEX], "scaled_time");
        assert_eq!(feature_index("V14"), Some(13));
    }

    #[test]
    fn test_sparse_profile_defaults_to_zero() {
        let fv = FeatureVector::zeros()
            .with("V17", -0.5)
            .and_then(|fv| fv.with("V14", -1.9))
            .unwrap();

        assert_eq!(fv.get("V17"), Some(-0.5));
        assert_eq!(fv.get("V14"), Some(-1.9));
        assert_eq!(fv.get("V1"), Some(0.0));
        assert_eq!(fv.get("scaled_time"), Some(0.0));
    }

    #[test]
    fn test_from_values_rejects_short_input() {
        let err = FeatureVector::from_values(&[0.0; 29]).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { field, .. } => assert_eq!(field, "scaled_time"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_map_requires_every_field() {
        let mut map: HashMap<String, f64> = FEATURE_NAMES
            .iter()
            .map(|n| (n.to_string(), 1.0))
            .collect();
        assert!(FeatureVector::from_map(&map).is_ok());

        map.remove("V9");
        let err = FeatureVector::from_map(&map).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { field, .. } => assert_eq!(field, "V9"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_map_rejects_raw_columns() {
        let mut map: HashMap<String, f64> = FEATURE_NAMES
            .iter()
            .map(|n| (n.to_string(), 0.0))
            .collect();
        map.insert("Amount".to_string(), 12.0);

        assert!(matches!(
            FeatureVector::from_map(&map),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_from_columns_enforces_order() {
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        let values = vec![0.0; FEATURE_COUNT];
        assert!(FeatureVector::from_columns(&names, &values).is_ok());

        names.swap(0, 1);
        let err = FeatureVector::from_columns(&names, &values).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { field, .. } => assert_eq!(field, "V1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_finite_values_rejected() {
        assert!(FeatureVector::zeros().with("V2", f64::NAN).is_err());
        let mut values = vec![0.0; FEATURE_COUNT];
        values[SCALED_AMOUNT_INDEX] = f64::INFINITY;
        assert!(FeatureVector::from_values(&values).is_err());
    }

    #[test]
    fn test_serde_as_flat_array() {
        let fv = FeatureVector::zeros().with("V3", 2.5).unwrap();
        let json = serde_json::to_string(&fv).unwrap();
        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(fv, back);

        assert!(serde_json::from_str::<FeatureVector>("[1.0, 2.0]").is_err());
    }
}
