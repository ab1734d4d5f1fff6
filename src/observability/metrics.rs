use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_created_total: IntCounterVec,
    pub delivery_transitions_total: IntCounterVec,
    pub claim_conflicts_total: IntCounter,
    pub dispatch_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_created_total = IntCounterVec::new(
            Opts::new(
                "deliveries_created_total",
                "Delivery orders created by dispatch mode",
            ),
            &["mode"],
        )
        .expect("valid deliveries_created_total metric");

        let delivery_transitions_total = IntCounterVec::new(
            Opts::new(
                "delivery_transitions_total",
                "Committed lifecycle transitions by action",
            ),
            &["action"],
        )
        .expect("valid delivery_transitions_total metric");

        let claim_conflicts_total = IntCounter::new(
            "claim_conflicts_total",
            "Claims lost to a concurrent claimant or a stale read",
        )
        .expect("valid claim_conflicts_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of delivery creation in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        registry
            .register(Box::new(deliveries_created_total.clone()))
            .expect("register deliveries_created_total");
        registry
            .register(Box::new(delivery_transitions_total.clone()))
            .expect("register delivery_transitions_total");
        registry
            .register(Box::new(claim_conflicts_total.clone()))
            .expect("register claim_conflicts_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");

        Self {
            registry,
            deliveries_created_total,
            delivery_transitions_total,
            claim_conflicts_total,
            dispatch_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
