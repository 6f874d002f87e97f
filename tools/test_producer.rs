//! Test Transaction Producer
//!
//! Publishes synthetic raw transactions to NATS for pipeline testing.
//!
//! Usage: `test-producer [nats_url] [subject] [count] [fraud_rate] [delay_ms] [seed]`

use fraud_screening_pipeline::synthetic::TransactionGenerator;
use fraud_screening_pipeline::types::RawTransaction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_FRAUD_RATE: f64 = 0.1;

/// Parse the fraud rate argument. Unparsable or non-finite input falls back
/// to the default; finite values are clamped to `[0, 1]`.
fn parse_fraud_rate(arg: Option<&str>) -> f64 {
    match arg.map(|s| s.parse::<f64>()) {
        None => DEFAULT_FRAUD_RATE,
        Some(Ok(rate)) if rate.is_finite() => rate.clamp(0.0, 1.0),
        Some(_) => {
            warn!(fraud_rate = ?arg, default = DEFAULT_FRAUD_RATE, "Invalid fraud rate, using default");
            DEFAULT_FRAUD_RATE
        }
    }
}

/// Picks legitimate or fraudulent profiles at a fixed rate
struct TrafficMix {
    generator: TransactionGenerator,
    rng: StdRng,
    fraud_rate: f64,
    legitimate: u64,
    suspicious: u64,
}

impl TrafficMix {
    /// `fraud_rate` must lie in `[0, 1]`; see [`parse_fraud_rate`].
    fn new(fraud_rate: f64, seed: Option<u64>) -> Self {
        let (generator, rng) = match seed {
            Some(seed) => (
                TransactionGenerator::with_seed(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (TransactionGenerator::from_entropy(), StdRng::from_entropy()),
        };
        Self {
            generator,
            rng,
            fraud_rate,
            legitimate: 0,
            suspicious: 0,
        }
    }

    fn next(&mut self) -> RawTransaction {
        if self.rng.gen_bool(self.fraud_rate) {
            self.suspicious += 1;
            self.generator.fraudulent()
        } else {
            self.legitimate += 1;
            self.generator.legitimate()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate = parse_fraud_rate(args.get(4).map(|s| s.as_str()));
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    let seed: Option<u64> = args.get(6).and_then(|s| s.parse().ok());

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        seed = ?seed,
        "Configuration loaded"
    );

    let mut mix = TrafficMix::new(fraud_rate, seed);

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(&mut mix, count, delay_ms).await;
        }
    };

    info!("Starting to publish {} transactions...", count);

    for i in 0..count {
        let transaction = mix.next();
        let payload = serde_json::to_vec(&transaction)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} transactions ({} legitimate, {} suspicious)",
                i + 1,
                count,
                mix.legitimate,
                mix.suspicious
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    client.flush().await?;

    info!(
        "Completed! Published {} transactions ({} legitimate, {} suspicious)",
        count, mix.legitimate, mix.suspicious
    );

    Ok(())
}

async fn run_dry_mode(mix: &mut TrafficMix, count: u64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    for i in 0..count {
        let transaction = mix.next();
        if (i + 1) % 10 == 0 || i == 0 {
            let json = serde_json::to_string_pretty(&transaction)?;
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Dry run finished ({} legitimate, {} suspicious)",
        mix.legitimate, mix.suspicious
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_rate_parsing() {
        assert_eq!(parse_fraud_rate(None), DEFAULT_FRAUD_RATE);
        assert_eq!(parse_fraud_rate(Some("0.25")), 0.25);
        assert_eq!(parse_fraud_rate(Some("3")), 1.0);
        assert_eq!(parse_fraud_rate(Some("-1")), 0.0);
        for bad in ["NaN", "inf", "-inf", "lots"] {
            assert_eq!(parse_fraud_rate(Some(bad)), DEFAULT_FRAUD_RATE, "{bad}");
        }
    }

    #[test]
    fn test_nan_rate_does_not_panic_generation() {
        let mut mix = TrafficMix::new(parse_fraud_rate(Some("NaN")), Some(3));
        for _ in 0..50 {
            mix.next();
        }
        assert_eq!(mix.legitimate + mix.suspicious, 50);
    }
}
