//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for the query pipeline and document
//! ingestion with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Lectern metrics
pub const METRICS_PREFIX: &str = "lectern";

/// Histogram buckets for query stages (in seconds); model calls dominate
pub const STAGE_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.025, // 25ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    90.00, // 90s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total queries by outcome"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end query latency in seconds"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Query pipeline stage latency in seconds"
    );

    describe_histogram!(
        format!("{}_candidates_count", METRICS_PREFIX),
        Unit::Count,
        "Candidates returned by the vector store per query"
    );

    describe_histogram!(
        format!("{}_optimized_count", METRICS_PREFIX),
        Unit::Count,
        "Chunks kept after optimization per query"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Uploads by outcome"
    );

    describe_counter!(
        format!("{}_documents_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents indexed"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document indexing latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one finished query
pub fn record_query(duration_secs: f64, outcome: &'static str) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome
    )
    .record(duration_secs);
}

/// Record one pipeline stage
pub fn record_stage(stage: &'static str, duration_secs: f64) {
    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage
    )
    .record(duration_secs);
}

/// Record how many chunks survived retrieval and optimization
pub fn record_selection(candidates: usize, optimized: usize) {
    histogram!(format!("{}_candidates_count", METRICS_PREFIX)).record(candidates as f64);
    histogram!(format!("{}_optimized_count", METRICS_PREFIX)).record(optimized as f64);
}

/// Record an upload by its outcome
pub fn record_upload(outcome: &'static str) {
    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, chunks_created: usize) {
    counter!(format!("{}_documents_indexed_total", METRICS_PREFIX)).increment(1);

    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}
