use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub optimizations_total: IntCounterVec,
    pub optimization_latency_seconds: HistogramVec,
    pub stop_transitions_total: IntCounterVec,
    pub journeys_active: IntGauge,
    pub stops_excluded_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let optimizations_total = IntCounterVec::new(
            Opts::new("optimizations_total", "Route optimizations by outcome"),
            &["outcome"],
        )
        .expect("valid optimizations_total metric");

        let optimization_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "optimization_latency_seconds",
                "Latency of route optimization in seconds, provider calls included",
            ),
            &["outcome"],
        )
        .expect("valid optimization_latency_seconds metric");

        let stop_transitions_total = IntCounterVec::new(
            Opts::new("stop_transitions_total", "Applied stop status transitions"),
            &["transition"],
        )
        .expect("valid stop_transitions_total metric");

        let journeys_active = IntGauge::new("journeys_active", "Journeys not yet completed")
            .expect("valid journeys_active metric");

        let stops_excluded_total = IntCounter::new(
            "stops_excluded_total",
            "Stops excluded by committed re-optimizations",
        )
        .expect("valid stops_excluded_total metric");

        registry
            .register(Box::new(optimizations_total.clone()))
            .expect("register optimizations_total");
        registry
            .register(Box::new(optimization_latency_seconds.clone()))
            .expect("register optimization_latency_seconds");
        registry
            .register(Box::new(stop_transitions_total.clone()))
            .expect("register stop_transitions_total");
        registry
            .register(Box::new(journeys_active.clone()))
            .expect("register journeys_active");
        registry
            .register(Box::new(stops_excluded_total.clone()))
            .expect("register stops_excluded_total");

        Self {
            registry,
            optimizations_total,
            optimization_latency_seconds,
            stop_transitions_total,
            journeys_active,
            stops_excluded_total,
        }
    }

    pub fn observe_optimization(&self, ok: bool, elapsed_seconds: f64) {
        let outcome = if ok { "success" } else { "error" };
        self.optimization_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed_seconds);
        self.optimizations_total.with_label_values(&[outcome]).inc();
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
