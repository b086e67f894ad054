use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all program director metrics
const PREFIX: &str = "program_director";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Generation runs
    pub static ref GENERATION_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_generation_runs_total"), "Total theme generation runs by outcome"),
        &["status"]
    ).expect("Failed to create generation_runs_total metric");

    pub static ref GENERATION_RUN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_generation_run_duration_seconds"),
            "Theme generation run duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0, 1800.0])
    ).expect("Failed to create generation_run_duration_seconds metric");

    // Curation
    pub static ref CURATION_FALLBACKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_curation_fallbacks_total"),
            "Curations that fell back to greedy selection"
        ),
        &["reason"]
    ).expect("Failed to create curation_fallbacks_total metric");

    pub static ref LLM_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_llm_requests_total"), "Generative model requests by outcome"),
        &["status"]
    ).expect("Failed to create llm_requests_total metric");

    // Cooldowns
    pub static ref ACTIVE_COOLDOWNS: Gauge = Gauge::new(
        format!("{PREFIX}_active_cooldowns"),
        "Media items currently inside their cooldown window"
    ).expect("Failed to create active_cooldowns metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(GENERATION_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(GENERATION_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CURATION_FALLBACKS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LLM_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ACTIVE_COOLDOWNS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request. `path` should be a route template, not the raw URI.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Collapse a request path onto its route template to keep label cardinality bounded.
pub fn categorize_endpoint(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["health"] => "/health",
        ["metrics"] => "/metrics",
        ["api", "v1", "themes"] => "/api/v1/themes",
        ["api", "v1", "themes", _, "generate"] => "/api/v1/themes/{name}/generate",
        ["api", "v1", "generate"] => "/api/v1/generate",
        ["api", "v1", "cooldowns"] => "/api/v1/cooldowns",
        ["api", "v1", "history"] => "/api/v1/history",
        _ => "other",
    }
}

pub fn record_generation_run(status: &str, elapsed: Duration) {
    GENERATION_RUNS_TOTAL.with_label_values(&[status]).inc();
    GENERATION_RUN_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

pub fn record_curation_fallback(reason: &str) {
    CURATION_FALLBACKS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_llm_request(status: &str) {
    LLM_REQUESTS_TOTAL.with_label_values(&[status]).inc();
}

pub fn set_active_cooldowns(count: usize) {
    ACTIVE_COOLDOWNS.set(count as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
