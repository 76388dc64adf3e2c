use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub loads_published_total: IntCounter,
    pub offers_total: IntCounterVec,
    pub trips_completed_total: IntCounter,
    pub location_pings_total: IntCounter,
    pub accept_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let loads_published_total =
            IntCounter::new("loads_published_total", "Loads made visible to carriers")
                .expect("valid loads_published_total metric");

        let offers_total = IntCounterVec::new(
            Opts::new("offers_total", "Offer lifecycle outcomes"),
            &["outcome"],
        )
        .expect("valid offers_total metric");

        let trips_completed_total =
            IntCounter::new("trips_completed_total", "Trips delivered to completion")
                .expect("valid trips_completed_total metric");

        let location_pings_total =
            IntCounter::new("location_pings_total", "Location pings ingested")
                .expect("valid location_pings_total metric");

        let accept_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "accept_latency_seconds",
                "Latency of the offer acceptance transaction in seconds",
            ),
            &["outcome"],
        )
        .expect("valid accept_latency_seconds metric");

        registry
            .register(Box::new(loads_published_total.clone()))
            .expect("register loads_published_total");
        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(trips_completed_total.clone()))
            .expect("register trips_completed_total");
        registry
            .register(Box::new(location_pings_total.clone()))
            .expect("register location_pings_total");
        registry
            .register(Box::new(accept_latency_seconds.clone()))
            .expect("register accept_latency_seconds");

        Self {
            registry,
            loads_published_total,
            offers_total,
            trips_completed_total,
            location_pings_total,
            accept_latency_seconds,
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
