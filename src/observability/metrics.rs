use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub accept_attempts_total: IntCounterVec,
    pub riders_online: IntGauge,
    pub poll_latency_seconds: HistogramVec,
    pub offers_expired_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Ride requests by lifecycle outcome"),
            &["outcome"],
        )
        .expect("valid requests_total metric");

        let accept_attempts_total = IntCounterVec::new(
            Opts::new("accept_attempts_total", "Accept attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accept_attempts_total metric");

        let riders_online = IntGauge::new("riders_online", "Riders currently online")
            .expect("valid riders_online metric");

        let poll_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "poll_latency_seconds",
                "Latency of rider poll handling in seconds",
            ),
            &["outcome"],
        )
        .expect("valid poll_latency_seconds metric");

        let offers_expired_total = IntCounter::new(
            "offers_expired_total",
            "Offers expired by the server-side sweep",
        )
        .expect("valid offers_expired_total metric");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("register requests_total");
        registry
            .register(Box::new(accept_attempts_total.clone()))
            .expect("register accept_attempts_total");
        registry
            .register(Box::new(riders_online.clone()))
            .expect("register riders_online");
        registry
            .register(Box::new(poll_latency_seconds.clone()))
            .expect("register poll_latency_seconds");
        registry
            .register(Box::new(offers_expired_total.clone()))
            .expect("register offers_expired_total");

        Self {
            registry,
            requests_total,
            accept_attempts_total,
            riders_online,
            poll_latency_seconds,
            offers_expired_total,
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
