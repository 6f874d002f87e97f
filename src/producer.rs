//! NATS message producer for screening verdicts

use crate::types::verdict::Verdict;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing verdicts to NATS
#[derive(Clone)]
pub struct VerdictProducer {
    client: Client,
    subject: String,
}

impl VerdictProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a verdict
    pub async fn publish(&self, verdict: &Verdict) -> Result<()> {
        let payload = serde_json::to_vec(verdict)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            verdict_id = %verdict.verdict_id,
            transaction_id = %verdict.transaction_id,
            decision = verdict.decision.label(),
            "Published verdict"
        );

        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
