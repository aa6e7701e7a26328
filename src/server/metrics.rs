//! Prometheus metrics for fleet upgrade passes
//!
//! - `jaeger_upgrade_instances_total{outcome}`: instances seen per outcome
//! - `jaeger_upgrade_passes_total{result}`: passes that listed the fleet or failed to
//! - `jaeger_upgrade_pass_duration_seconds`: wall time of a pass

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub type SharedMetrics = Arc<UpgradeMetrics>;

pub struct UpgradeMetrics {
    registry: Registry,
    instances_total: IntCounterVec,
    passes_total: IntCounterVec,
    pass_duration: Histogram,
}

impl UpgradeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let instances_total = IntCounterVec::new(
            Opts::new(
                "jaeger_upgrade_instances_total",
                "Jaeger instances processed by upgrade passes, by outcome",
            ),
            &["outcome"],
        )?;
        let passes_total = IntCounterVec::new(
            Opts::new("jaeger_upgrade_passes_total", "Fleet upgrade passes, by result"),
            &["result"],
        )?;
        let pass_duration = Histogram::with_opts(
            HistogramOpts::new(
                "jaeger_upgrade_pass_duration_seconds",
                "Duration of fleet upgrade passes",
            )
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )?;

        registry.register(Box::new(instances_total.clone()))?;
        registry.register(Box::new(passes_total.clone()))?;
        registry.register(Box::new(pass_duration.clone()))?;

        Ok(UpgradeMetrics {
            registry,
            instances_total,
            passes_total,
            pass_duration,
        })
    }

    pub fn record_instance(&self, outcome: &str) {
        self.instances_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_pass(&self, ok: bool, duration_secs: f64) {
        let result = if ok { "success" } else { "failure" };
        self.passes_total.with_label_values(&[result]).inc();
        self.pass_duration.observe(duration_secs);
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(UpgradeMetrics::new()?))
}
