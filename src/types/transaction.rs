//! Raw transaction records as they arrive from upstream.

use crate::error::{PipelineError, Result};
use crate::types::features::COMPONENT_COUNT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction before standardization.
///
/// Mirrors the dataset columns `Time, V1..V28, Amount`. `Amount` and `Time`
/// are raw; the scorer standardizes them with the artifact's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Unique transaction identifier
    #[serde(default = "generate_transaction_id")]
    pub transaction_id: String,

    /// Seconds elapsed since the first transaction in the dataset
    #[serde(alias = "Time")]
    pub time: f64,

    /// Anonymized PCA components V1..V28
    #[serde(alias = "V")]
    pub components: Vec<f64>,

    /// Transaction amount
    #[serde(alias = "Amount")]
    pub amount: f64,

    /// Arrival timestamp
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

impl RawTransaction {
    /// Create a transaction with all components zero.
    pub fn new(transaction_id: impl Into<String>, time: f64, amount: f64) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            time,
            components: vec![0.0; COMPONENT_COUNT],
            amount,
            received_at: Utc::now(),
        }
    }

    /// Replace the PCA components.
    pub fn with_components(mut self, components: Vec<f64>) -> Self {
        self.components = components;
        self
    }

    /// Set a single component by its 1-based name index (`V1` is 1).
    pub fn with_component(mut self, index: usize, value: f64) -> Self {
        if (1..=self.components.len()).contains(&index) {
            self.components[index - 1] = value;
        }
        self
    }

    /// Check the component count.
    pub fn validate(&self) -> Result<()> {
        if self.components.len() != COMPONENT_COUNT {
            let field = if self.components.len() < COMPONENT_COUNT {
                format!("V{}", self.components.len() + 1)
            } else {
                format!("V{}", COMPONENT_COUNT + 1)
            };
            return Err(PipelineError::schema(
                field,
                format!(
                    "transaction {} has {} components, expected {}",
                    self.transaction_id,
                    self.components.len(),
                    COMPONENT_COUNT
                ),
            ));
        }
        Ok(())
    }
}

/// A raw transaction with its ground-truth label (`Class` column).
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTransaction {
    pub transaction: RawTransaction,
    pub is_fraud: bool,
}

impl LabeledTransaction {
    /// Build from a dataset row in column order `Time, V1..V28, Amount`.
    pub fn from_row(transaction_id: impl Into<String>, row: &[f64], is_fraud: bool) -> Result<Self> {
        let expected = COMPONENT_COUNT + 2;
        if row.len() != expected {
            return Err(PipelineError::TrainingData(format!(
                "record has {} raw fields, expected {} (Time, V1..V28, Amount)",
                row.len(),
                expected
            )));
        }

        let transaction = RawTransaction {
            transaction_id: transaction_id.into(),
            time: row[0],
            components: row[1..=COMPONENT_COUNT].to_vec(),
            amount: row[COMPONENT_COUNT + 1],
            received_at: Utc::now(),
        };
        Ok(Self {
            transaction,
            is_fraud,
        })
    }
}
