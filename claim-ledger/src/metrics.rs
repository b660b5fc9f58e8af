//! Metrics collection for observability
//!
//! Prometheus metrics for the claim ledger. Every collector lives in a private
//! registry so several ledgers can coexist in one process (tests, embedding).
//!
//! # Metrics
//!
//! - `claims_issued_total` - Claims created and funded
//! - `claims_redeemed_total` - Claims redeemed to a wallet
//! - `claims_forwarded_total` - Claims forwarded to a new recipient
//! - `claims_mover_failures_total` - Funds mover failures and timeouts
//! - `claims_rate_limited_total` - Requests rejected by the rate limiter
//! - `claims_redeem_duration_seconds` - Histogram of redemption latencies

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Claims issued
    pub claims_issued: IntCounter,

    /// Claims redeemed
    pub claims_redeemed: IntCounter,

    /// Claims forwarded
    pub claims_forwarded: IntCounter,

    /// Mover failures
    pub mover_failures: IntCounter,

    /// Rate limited requests
    pub rate_limited: IntCounter,

    /// Redemption duration histogram
    pub redeem_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("claims_issued", &self.claims_issued.get())
            .field("claims_redeemed", &self.claims_redeemed.get())
            .field("claims_forwarded", &self.claims_forwarded.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let claims_issued = IntCounter::new("claims_issued_total", "Claims created and funded")?;
        registry.register(Box::new(claims_issued.clone()))?;

        let claims_redeemed =
            IntCounter::new("claims_redeemed_total", "Claims redeemed to a wallet")?;
        registry.register(Box::new(claims_redeemed.clone()))?;

        let claims_forwarded = IntCounter::new(
            "claims_forwarded_total",
            "Claims forwarded to a new recipient",
        )?;
        registry.register(Box::new(claims_forwarded.clone()))?;

        let mover_failures = IntCounter::new(
            "claims_mover_failures_total",
            "Funds mover failures and timeouts",
        )?;
        registry.register(Box::new(mover_failures.clone()))?;

        let rate_limited = IntCounter::new(
            "claims_rate_limited_total",
            "Requests rejected by the rate limiter",
        )?;
        registry.register(Box::new(rate_limited.clone()))?;

        let redeem_duration = Histogram::with_opts(
            HistogramOpts::new(
                "claims_redeem_duration_seconds",
                "Histogram of redemption latencies",
            )
            .buckets(vec![0.005, 0.010, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 15.0]),
        )?;
        registry.register(Box::new(redeem_duration.clone()))?;

        Ok(Self {
            claims_issued,
            claims_redeemed,
            claims_forwarded,
            mover_failures,
            rate_limited,
            redeem_duration,
            registry,
        })
    }

    /// Record an issued claim
    pub fn record_issued(&self) {
        self.claims_issued.inc();
    }

    /// Record a redemption and its latency
    pub fn record_redeemed(&self, duration_seconds: f64) {
        self.claims_redeemed.inc();
        self.redeem_duration.observe(duration_seconds);
    }

    /// Record a forward
    pub fn record_forwarded(&self) {
        self.claims_forwarded.inc();
    }

    /// Record a mover failure or timeout
    pub fn record_mover_failure(&self) {
        self.mover_failures.inc();
    }

    /// Record a rate limited request
    pub fn record_rate_limited(&self) {
        self.rate_limited.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.claims_issued.get(), 0);
        assert_eq!(metrics.claims_redeemed.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.record_issued();
        assert_eq!(first.claims_issued.get(), 1);
        assert_eq!(second.claims_issued.get(), 0);
    }

    #[test]
    fn test_record_redeemed() {
        let metrics = Metrics::new().unwrap();
        metrics.record_redeemed(0.02);
        metrics.record_redeemed(0.3);
        assert_eq!(metrics.claims_redeemed.get(), 2);
        assert_eq!(metrics.redeem_duration.get_sample_count(), 2);
    }

    #[test]
    fn test_render_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_forwarded();
        metrics.record_rate_limited();

        let text = metrics.render();
        assert!(text.contains("claims_forwarded_total 1"));
        assert!(text.contains("claims_rate_limited_total 1"));
    }
}
