//! NATS message consumer for incoming transactions

use crate::types::transaction::RawTransaction;
use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving raw transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.subject))?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode a message payload into a raw transaction
pub fn decode(payload: &[u8]) -> Result<RawTransaction> {
    serde_json::from_slice(payload).context("Failed to deserialize transaction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dataset_style_payload() {
        let payload = format!(
            r#"{{"transaction_id":"tx_1","Time":406.0,"V":{},"Amount":0.0}}"#,
            serde_json::to_string(&vec![0.5; 28]).unwrap()
        );
        let tx = decode(payload.as_bytes()).unwrap();
        assert_eq!(tx.transaction_id, "tx_1");
        assert_eq!(tx.time, 406.0);
        assert_eq!(tx.components.len(), 28);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_decode_assigns_missing_id() {
        let payload = r#"{"time":1.0,"components":[],"amount":2.0}"#;
        let tx = decode(payload.as_bytes()).unwrap();
        assert!(tx.transaction_id.starts_with("tx_"));
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"not json").is_err());
    }
}
