//! Telemetry and structured logging: OpenTelemetry setup, conversion
//! metrics, and the error-reporting boundary.

use std::collections::HashMap;

use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ConvertError;
use crate::queue::DispatcherStats;

/// Conversion counters and the submit-to-terminal duration histogram.
///
/// Every hook is fire-and-forget: before a meter provider is installed the
/// instruments are no-ops, so callers never depend on telemetry being up.
pub struct Metrics {
    submitted: Counter<u64>,
    success: Counter<u64>,
    errors: Counter<u64>,
    failed: Counter<u64>,
    fallback: Counter<u64>,
    cancelled: Counter<u64>,
    duration_ms: Histogram<f64>,
}

impl Metrics {
    pub fn new() -> Self {
        let meter = global::meter("rendermill");
        Self {
            submitted: meter.u64_counter("conversions_submitted").init(),
            success: meter.u64_counter("conversions_succeeded").init(),
            errors: meter.u64_counter("conversion_errors").init(),
            failed: meter.u64_counter("conversions_failed").init(),
            fallback: meter.u64_counter("conversion_fallbacks").init(),
            cancelled: meter.u64_counter("conversions_cancelled").init(),
            duration_ms: meter.f64_histogram("conversion_duration_ms").init(),
        }
    }

    pub fn job_submitted(&self) {
        self.submitted.add(1, &[]);
    }

    /// Terminal success: counter plus the request duration.
    pub fn conversion_succeeded(&self, elapsed_ms: f64) {
        self.success.add(1, &[]);
        self.duration_ms
            .record(elapsed_ms, &[KeyValue::new("outcome", "success")]);
    }

    /// Per-category error counter, bumped for every failed attempt,
    /// including a primary failure that is later retried.
    pub fn failure_observed(&self, err: &ConvertError) {
        self.errors
            .add(1, &[KeyValue::new("category", err.category())]);
    }

    /// Terminal failure: counter plus the request duration.
    pub fn conversion_failed(&self, err: &ConvertError, elapsed_ms: f64) {
        self.failed
            .add(1, &[KeyValue::new("category", err.category())]);
        self.duration_ms
            .record(elapsed_ms, &[KeyValue::new("outcome", "failure")]);
    }

    pub fn fallback_attempted(&self) {
        self.fallback.add(1, &[]);
    }

    pub fn conversion_cancelled(&self) {
        self.cancelled.add(1, &[]);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborator receiving non-timeout failures with request context.
/// Fire-and-forget; the pipeline never blocks on reporting.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorReporter: Send + Sync {
    fn report(&self, err: &ConvertError, context: HashMap<&'static str, String>);
}

/// Default reporter: structured error logs.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &ConvertError, context: HashMap<&'static str, String>) {
        let url = context.get("url").cloned().unwrap_or_default();
        error!(error = %err, url = %url, "conversion failure reported");
    }
}

/// Emits the per-job span once a job reaches its terminal signal.
pub fn record_job_span(
    job_id: Uuid,
    uri: &str,
    outcome: &'static str,
    queue_wait_ms: i64,
    duration_ms: i64,
) {
    let tracer = global::tracer("rendermill");
    let mut span = tracer.start("conversion_job");
    span.set_attribute(KeyValue::new("job_id", job_id.to_string()));
    span.set_attribute(KeyValue::new("uri", uri.to_string()));
    span.set_attribute(KeyValue::new("outcome", outcome));
    span.set_attribute(KeyValue::new("queue_wait_ms", queue_wait_ms));
    span.set_attribute(KeyValue::new("duration_ms", duration_ms));
    span.end();
}

/// Periodic dispatcher health signal.
pub fn record_heartbeat(stats: &DispatcherStats) {
    let tracer = global::tracer("rendermill");
    let mut span = tracer.start("dispatcher_heartbeat");
    span.set_attribute(KeyValue::new("queued", stats.queued as i64));
    span.set_attribute(KeyValue::new("active_workers", stats.active as i64));
    span.end();

    info!(
        queued = stats.queued,
        capacity = stats.capacity,
        workers = stats.workers,
        active = stats.active,
        "dispatcher heartbeat"
    );
}

/// Initializes OpenTelemetry with an OTLP exporter.
///
/// Called once at startup. Reads configuration from environment variables:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` - collector endpoint (default: http://localhost:4317)
/// - `OTEL_SERVICE_NAME` - service name (default: rendermill)
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "rendermill".to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&endpoint),
        )
        .with_trace_config(Config::default().with_resource(opentelemetry_sdk::Resource::new(
            vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ],
        )))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    global::set_tracer_provider(tracer.provider().ok_or("tracer has no provider")?);

    info!(endpoint = %endpoint, "telemetry initialized");
    Ok(())
}
