use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub records_created_total: IntCounterVec,
    pub payments_total: IntCounterVec,
    pub ratings_total: IntCounterVec,
    pub storage_write_failures_total: IntCounterVec,
    pub payment_latency_seconds: HistogramVec,
    pub active_delivery_blocks: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let records_created_total = IntCounterVec::new(
            Opts::new("records_created_total", "Records created by kind"),
            &["kind"],
        )
        .expect("valid records_created_total metric");

        let payments_total = IntCounterVec::new(
            Opts::new("payments_total", "Mock payments by item kind and outcome"),
            &["kind", "outcome"],
        )
        .expect("valid payments_total metric");

        let ratings_total = IntCounterVec::new(
            Opts::new("ratings_total", "Ratings submitted by item kind"),
            &["kind"],
        )
        .expect("valid ratings_total metric");

        let storage_write_failures_total = IntCounterVec::new(
            Opts::new(
                "storage_write_failures_total",
                "Failed collection writes by storage key",
            ),
            &["key"],
        )
        .expect("valid storage_write_failures_total metric");

        let payment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "payment_latency_seconds",
                "Time from payment request to settlement in seconds",
            ),
            &["kind"],
        )
        .expect("valid payment_latency_seconds metric");

        let active_delivery_blocks =
            IntGauge::new("active_delivery_blocks", "Delivery blocks currently active")
                .expect("valid active_delivery_blocks metric");

        registry
            .register(Box::new(records_created_total.clone()))
            .expect("register records_created_total");
        registry
            .register(Box::new(payments_total.clone()))
            .expect("register payments_total");
        registry
            .register(Box::new(ratings_total.clone()))
            .expect("register ratings_total");
        registry
            .register(Box::new(storage_write_failures_total.clone()))
            .expect("register storage_write_failures_total");
        registry
            .register(Box::new(payment_latency_seconds.clone()))
            .expect("register payment_latency_seconds");
        registry
            .register(Box::new(active_delivery_blocks.clone()))
            .expect("register active_delivery_blocks");

        Self {
            registry,
            records_created_total,
            payments_total,
            ratings_total,
            storage_write_failures_total,
            payment_latency_seconds,
            active_delivery_blocks,
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
