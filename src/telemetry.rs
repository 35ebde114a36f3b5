use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    pipeline_runs: Counter<u64>,
    pipeline_duration: Histogram<u64>,
    detections_last: Gauge<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("alpr_bridge");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let pipeline_runs = meter
            .u64_counter("pipeline_runs_total")
            .with_description("Analyze runs by outcome")
            .build();

        // Capture plus a remote inference call: tens of ms up to the request timeout.
        let boundaries = generate_boundaries((10, 100, 500, 2000, 30000));

        let pipeline_duration = meter
            .u64_histogram("pipeline_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of analyze runs in milliseconds")
            .build();

        let detections_last = meter
            .u64_gauge("detections_last")
            .with_description("Number of detections in the latest result")
            .build();

        Ok(Metrics {
            request_counter,
            pipeline_runs,
            pipeline_duration,
            detections_last,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_pipeline_run(&self, outcome: &'static str, duration_ms: u64) {
        let attributes = vec![KeyValue::new("outcome", outcome)];
        self.pipeline_runs.add(1, &attributes);
        self.pipeline_duration.record(duration_ms, &attributes);
    }

    pub fn record_detections(&self, count: u64) {
        self.detections_last.record(count, &[]);
    }
}

fn generate_boundaries(parts: (u64, u64, u64, u64, u64)) -> Vec<f64> {
    let first_step: usize = 10;
    let middle_step: usize = 50;
    let end_step: usize = 250;
    let tail_step: usize = 4000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
