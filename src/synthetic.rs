//! Synthetic transaction generation.
//!
//! Produces records in the credit-card schema for load testing and for
//! exercising the trainer without the real dataset. Legitimate components are
//! standard normal; fraudulent ones shift the components that carry most of
//! the fraud signal in the real data (V10, V12, V14, V17).

use crate::types::features::COMPONENT_COUNT;
use crate::types::transaction::{LabeledTransaction, RawTransaction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seconds covered by the dataset's `Time` column (two days)
const TIME_SPAN_SECS: f64 = 172_800.0;

/// (1-based component, mean) shifts applied to fraudulent records
const FRAUD_SHIFTS: [(usize, f64); 4] = [(14, -7.0), (17, -6.0), (12, -5.0), (10, -4.0)];

/// Seeded generator of raw and labeled transactions
pub struct TransactionGenerator {
    rng: StdRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            transaction_counter: 0,
        }
    }

    /// Generator seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            transaction_counter: 0,
        }
    }

    /// Generate a transaction with the legitimate profile
    pub fn legitimate(&mut self) -> RawTransaction {
        let components = (0..COMPONENT_COUNT).map(|_| self.normal(0.0, 1.0)).collect();
        let amount = self.rng.gen_range(1.0..200.0);
        self.transaction(amount, components)
    }

    /// Generate a transaction with the fraudulent profile
    pub fn fraudulent(&mut self) -> RawTransaction {
        let mut components: Vec<f64> = (0..COMPONENT_COUNT).map(|_| self.normal(0.0, 1.0)).collect();
        for (component, mean) in FRAUD_SHIFTS {
            components[component - 1] = self.normal(mean, 1.0);
        }
        let amount = self.rng.gen_range(1.0..1000.0);
        self.transaction(amount, components)
    }

    /// Labeled corpus: `n_legit` legitimate records followed by `n_fraud` fraudulent ones.
    pub fn labeled_corpus(&mut self, n_legit: usize, n_fraud: usize) -> Vec<LabeledTransaction> {
        let mut corpus = Vec::with_capacity(n_legit + n_fraud);
        for _ in 0..n_legit {
            corpus.push(LabeledTransaction {
                transaction: self.legitimate(),
                is_fraud: false,
            });
        }
        for _ in 0..n_fraud {
            corpus.push(LabeledTransaction {
                transaction: self.fraudulent(),
                is_fraud: true,
            });
        }
        corpus
    }

    fn transaction(&mut self, amount: f64, components: Vec<f64>) -> RawTransaction {
        self.transaction_counter += 1;
        let time = self.rng.gen_range(0.0..TIME_SPAN_SECS);
        RawTransaction::new(format!("tx_{:012}", self.transaction_counter), time, amount)
            .with_components(components)
    }

    /// Box-Muller sample from N(mean, std²)
    fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std * z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_transactions_are_valid() {
        let mut generator = TransactionGenerator::with_seed(1);
        for _ in 0..20 {
            assert!(generator.legitimate().validate().is_ok());
            assert!(generator.fraudulent().validate().is_ok());
        }
    }

    #[test]
    fn test_corpus_is_seeded() {
        let a = TransactionGenerator::with_seed(3).labeled_corpus(10, 5);
        let b = TransactionGenerator::with_seed(3).labeled_corpus(10, 5);

        assert_eq!(a.len(), 15);
        assert_eq!(a.iter().filter(|r| r.is_fraud).count(), 5);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.transaction.components, y.transaction.components);
            assert_eq!(x.transaction.amount, y.transaction.amount);
        }
    }

    #[test]
    fn test_fraud_profile_shifts_v14() {
        let corpus = TransactionGenerator::with_seed(5).labeled_corpus(200, 200);
        let mean_v14 = |fraud: bool| {
            let values: Vec<f64> = corpus
                .iter()
                .filter(|r| r.is_fraud == fraud)
                .map(|r| r.transaction.components[13])
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        };

        assert!(mean_v14(false).abs() < 0.5);
        assert!((mean_v14(true) + 7.0).abs() < 0.5);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut generator = TransactionGenerator::with_seed(9);
        let a = generator.legitimate();
        let b = generator.fraudulent();
        assert_ne!(a.transaction_id, b.transaction_id);
    }
}
