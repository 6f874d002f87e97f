//! Screening statistics for the pipeline service.

use crate::error::PipelineError;
use crate::types::verdict::{Decision, Verdict};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Samples kept per latency series
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for screening outcomes and tier latency
pub struct PipelineMetrics {
    /// Verdicts produced
    pub transactions_screened: AtomicU64,
    pub approved: AtomicU64,
    pub blocked: AtomicU64,
    pub escalated_approved: AtomicU64,
    pub escalated_blocked: AtomicU64,
    /// Transactions that reached the deep tier but got no verdict in time
    pub deep_timeouts: AtomicU64,
    pub deep_failures: AtomicU64,
    /// Inputs rejected before scoring
    pub schema_rejections: AtomicU64,
    /// Payloads that never decoded into a transaction
    pub decode_failures: AtomicU64,
    /// Edge tier latency (microseconds)
    edge_times: RwLock<Vec<u64>>,
    /// Deep tier latency (microseconds)
    deep_times: RwLock<Vec<u64>>,
    /// Edge probability distribution buckets
    edge_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_screened: AtomicU64::new(0),
            approved: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            escalated_approved: AtomicU64::new(0),
            escalated_blocked: AtomicU64::new(0),
            deep_timeouts: AtomicU64::new(0),
            deep_failures: AtomicU64::new(0),
            schema_rejections: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            edge_times: RwLock::new(Vec::with_capacity(1000)),
            deep_times: RwLock::new(Vec::with_capacity(1000)),
            edge_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a verdict: decision counts, tier latency and edge score bucket
    pub fn record_verdict(&self, verdict: &Verdict) {
        self.transactions_screened.fetch_add(1, Ordering::Relaxed);
        let counter = match verdict.decision {
            Decision::Approved => &self.approved,
            Decision::Blocked => &self.blocked,
            Decision::EscalatedApproved => &self.escalated_approved,
            Decision::EscalatedBlocked => &self.escalated_blocked,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        push_sample(&self.edge_times, verdict.edge.elapsed);
        if let Some(deep) = &verdict.deep {
            push_sample(&self.deep_times, deep.elapsed);
        }

        let bucket = (verdict.edge_probability() * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.edge_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a transaction that produced no verdict
    pub fn record_error(&self, error: &PipelineError) {
        let counter = match error {
            PipelineError::DeepTierTimeout { elapsed, .. } => {
                push_sample(&self.deep_times, *elapsed);
                &self.deep_timeouts
            }
            PipelineError::DeepTierFailure { .. } => &self.deep_failures,
            _ => &self.schema_rejections,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a payload dropped before screening
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn edge_latency(&self) -> LatencyStats {
        latency_stats(&self.edge_times)
    }

    pub fn deep_latency(&self) -> LatencyStats {
        latency_stats(&self.deep_times)
    }

    /// Share of screened transactions that were escalated
    pub fn escalation_rate(&self) -> f64 {
        let screened = self.transactions_screened.load(Ordering::Relaxed);
        if screened == 0 {
            return 0.0;
        }
        let escalated = self.escalated_approved.load(Ordering::Relaxed)
            + self.escalated_blocked.load(Ordering::Relaxed);
        escalated as f64 / screened as f64
    }

    /// Verdicts per second since start
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_screened.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn edge_distribution(&self) -> [u64; 10] {
        match self.edge_buckets.read() {
            Ok(buckets) => *buckets,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let screened = self.transactions_screened.load(Ordering::Relaxed);
        let edge = self.edge_latency();
        let deep = self.deep_latency();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FRAUD SCREENING PIPELINE - METRICS SUMMARY        ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Screened: {:>8}  │  Throughput: {:>6.1} tx/s  ║",
            screened,
            self.throughput()
        );
        info!(
            "║ Approved: {:>8}  Blocked: {:>8}  Escalated: {:>5.1}%      ║",
            self.approved.load(Ordering::Relaxed),
            self.blocked.load(Ordering::Relaxed),
            self.escalation_rate() * 100.0
        );
        info!(
            "║ Escalated approved: {:>6}  Escalated blocked: {:>6}        ║",
            self.escalated_approved.load(Ordering::Relaxed),
            self.escalated_blocked.load(Ordering::Relaxed)
        );
        info!(
            "║ Deep timeouts: {:>6}  Deep failures: {:>6}  Rejected: {:>6} ║",
            self.deep_timeouts.load(Ordering::Relaxed),
            self.deep_failures.load(Ordering::Relaxed),
            self.schema_rejections.load(Ordering::Relaxed)
        );
        info!(
            "║ Undecodable payloads: {:>8}                               ║",
            self.decode_failures.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Edge latency (μs): mean={:>6} p50={:>6} p99={:>6}           ║",
            edge.mean_us, edge.p50_us, edge.p99_us
        );
        info!(
            "║ Deep latency (μs): mean={:>8} p50={:>8} p99={:>8}     ║",
            deep.mean_us, deep.p50_us, deep.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Edge Probability Distribution:                               ║");
        let distribution = self.edge_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_sample(series: &RwLock<Vec<u64>>, elapsed: Duration) {
    if let Ok(mut times) = series.write() {
        times.push(elapsed.as_micros() as u64);
        if times.len() > MAX_SAMPLES {
            times.drain(0..MAX_SAMPLES / 2);
        }
    }
}

fn latency_stats(series: &RwLock<Vec<u64>>) -> LatencyStats {
    let mut sorted = match series.read() {
        Ok(times) => times.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    if sorted.is_empty() {
        return LatencyStats::default();
    }
    sorted.sort_unstable();

    let count = sorted.len();
    let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
    LatencyStats {
        count: count as u64,
        mean_us: sorted.iter().sum::<u64>() / count as u64,
        p50_us: percentile(0.5),
        p99_us: percentile(0.99),
        max_us: sorted[count - 1],
    }
}

/// Latency statistics of one tier
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
