use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_runs_total: IntCounterVec,
    pub dispatch_run_seconds: HistogramVec,
    pub offers_total: IntCounterVec,
    pub offers_in_flight: IntGauge,
    pub orders_in_queue: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_runs_total = IntCounterVec::new(
            Opts::new("dispatch_runs_total", "Total dispatch runs by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_runs_total metric");

        let dispatch_run_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dispatch_run_seconds",
                "Wall time of a dispatch run in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 20.0, 60.0, 120.0, 300.0]),
            &["outcome"],
        )
        .expect("valid dispatch_run_seconds metric");

        let offers_total = IntCounterVec::new(
            Opts::new("offers_total", "Offers sent to couriers by result"),
            &["result"],
        )
        .expect("valid offers_total metric");

        let offers_in_flight =
            IntGauge::new("offers_in_flight", "Offers currently awaiting a response")
                .expect("valid offers_in_flight metric");

        let orders_in_queue = IntGauge::new("orders_in_queue", "Orders waiting for a dispatch run")
            .expect("valid orders_in_queue metric");

        registry
            .register(Box::new(dispatch_runs_total.clone()))
            .expect("register dispatch_runs_total");
        registry
            .register(Box::new(dispatch_run_seconds.clone()))
            .expect("register dispatch_run_seconds");
        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(offers_in_flight.clone()))
            .expect("register offers_in_flight");
        registry
            .register(Box::new(orders_in_queue.clone()))
            .expect("register orders_in_queue");

        Self {
            registry,
            dispatch_runs_total,
            dispatch_run_seconds,
            offers_total,
            offers_in_flight,
            orders_in_queue,
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

    /// Counts one offer as in flight until the guard is dropped.
    pub fn track_offer(&self) -> InFlightGuard {
        InFlightGuard::new(self.offers_in_flight.clone())
    }
}

/// Holds a gauge incremented for as long as it lives, including when the
/// owning task is cancelled.
#[must_use = "the gauge is decremented as soon as the guard is dropped"]
pub struct InFlightGuard(IntGauge);

impl InFlightGuard {
    fn new(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
