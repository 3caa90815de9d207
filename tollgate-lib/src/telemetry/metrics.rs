use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const POLICY: &str = "policy";
    pub const STRATEGY: &str = "strategy";
    pub const METHOD: &str = "method";
    pub const STATUS_CODE: &str = "status_code";
    pub const ERROR_TYPE: &str = "error_type";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const ERROR_CONNECT: &str = "connect";
    pub const ERROR_REQUEST: &str = "request";
}

#[derive(Clone)]
pub struct Metrics {
    // Admission metrics
    pub admission_requests_total: Counter<u64>,
    pub admission_allowed_total: Counter<u64>,
    pub admission_rejected_total: Counter<u64>,

    // Idle sweep metrics
    pub buckets_evicted_total: Counter<u64>,
    pub sweeps_total: Counter<u64>,
    pub sweep_failures_total: Counter<u64>,

    // Upstream metrics
    pub upstream_requests_total: Counter<u64>,
    pub upstream_errors_total: Counter<u64>,
    pub upstream_duration_seconds: Histogram<f64>,

    pub connections_active: UpDownCounter<i64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            admission_requests_total: meter
                .u64_counter("tollgate_admission_requests_total")
                .with_description("Total number of admission checks")
                .build(),
            admission_allowed_total: meter
                .u64_counter("tollgate_admission_allowed_total")
                .with_description("Total number of requests admitted")
                .build(),
            admission_rejected_total: meter
                .u64_counter("tollgate_admission_rejected_total")
                .with_description("Total number of requests rejected with 429")
                .build(),

            buckets_evicted_total: meter
                .u64_counter("tollgate_buckets_evicted_total")
                .with_description("Total number of idle buckets evicted by the sweeper")
                .build(),
            sweeps_total: meter
                .u64_counter("tollgate_sweeps_total")
                .with_description("Total number of completed idle sweeps")
                .build(),
            sweep_failures_total: meter
                .u64_counter("tollgate_sweep_failures_total")
                .with_description("Total number of idle sweeps that panicked")
                .build(),

            upstream_requests_total: meter
                .u64_counter("tollgate_upstream_requests_total")
                .with_description("Total number of requests forwarded upstream")
                .build(),
            upstream_errors_total: meter
                .u64_counter("tollgate_upstream_errors_total")
                .with_description("Total number of failed upstream requests")
                .build(),
            upstream_duration_seconds: meter
                .f64_histogram("tollgate_upstream_duration_seconds")
                .with_description("Upstream request duration in seconds")
                .build(),

            connections_active: meter
                .i64_up_down_counter("tollgate_connections_active")
                .with_description("Number of active client connections")
                .build(),

            build_info: meter
                .u64_gauge("tollgate_build_info")
                .with_description("Build information")
                .build(),
        }
    }

    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    /// Record the outcome of one admission check.
    pub fn record_admission(&self, policy: &str, strategy: &str, admitted: bool) {
        let attrs = [
            KeyValue::new(labels::POLICY, policy.to_string()),
            KeyValue::new(labels::STRATEGY, strategy.to_string()),
        ];
        self.admission_requests_total.add(1, &attrs);
        if admitted {
            self.admission_allowed_total.add(1, &attrs);
        } else {
            self.admission_rejected_total.add(1, &attrs);
        }
    }

    pub fn record_sweep(&self, policy: &str, evicted: usize) {
        let attrs = [KeyValue::new(labels::POLICY, policy.to_string())];
        self.sweeps_total.add(1, &attrs);
        if evicted > 0 {
            self.buckets_evicted_total.add(evicted as u64, &attrs);
        }
    }

    pub fn record_sweep_failure(&self, policy: &str) {
        self.sweep_failures_total
            .add(1, &[KeyValue::new(labels::POLICY, policy.to_string())]);
    }

    pub fn record_upstream_request(&self, method: &str, status_code: u16, duration: f64) {
        let attrs = [
            KeyValue::new(labels::METHOD, method.to_string()),
            KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
        ];
        self.upstream_requests_total.add(1, &attrs);
        self.upstream_duration_seconds.record(duration, &attrs);
    }

    pub fn record_upstream_error(&self, error_type: &str) {
        self.upstream_errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, error_type.to_string())]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("tollgate");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
