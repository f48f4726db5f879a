//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// Lesson requests total (counter).
pub const LESSON_REQUESTS_TOTAL: &str = "lesson_requests_total";
/// Lessons served total (counter, labels: source).
pub const LESSONS_SERVED_TOTAL: &str = "lessons_served_total";
/// Cache hits (counter).
pub const LESSON_CACHE_HITS_TOTAL: &str = "lesson_cache_hits_total";
/// Cache misses (counter).
pub const LESSON_CACHE_MISSES_TOTAL: &str = "lesson_cache_misses_total";
/// Pending lessons consumed (counter).
pub const PENDING_CONSUMED_TOTAL: &str = "pending_consumed_total";
/// Pending lessons discarded at read time (counter, labels: reason).
pub const PENDING_DISCARDED_TOTAL: &str = "pending_discarded_total";
/// Pending lessons produced in the background (counter).
pub const PENDING_PRODUCED_TOTAL: &str = "pending_produced_total";
/// Near-duplicate lessons served anyway (counter).
pub const NEAR_DUPLICATE_SERVED_TOTAL: &str = "near_duplicate_served_total";
/// Path synthesis runs (counter).
pub const PATH_SYNTHESIS_TOTAL: &str = "path_synthesis_total";
/// Path synthesis lock contention (counter).
pub const PATH_SYNTHESIS_CONTENTION_TOTAL: &str = "path_synthesis_contention_total";
/// Generation timeouts surfaced as retryable (counter).
pub const GENERATION_TIMEOUTS_TOTAL: &str = "generation_timeouts_total";
/// Generator call errors (counter, labels: category).
pub const GENERATION_ERRORS_TOTAL: &str = "generation_errors_total";
/// Generator request latency (histogram).
pub const GENERATOR_REQUEST_DURATION_SECONDS: &str = "generator_request_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_snake_case() {
        for name in [
            LESSON_REQUESTS_TOTAL,
            LESSONS_SERVED_TOTAL,
            LESSON_CACHE_HITS_TOTAL,
            LESSON_CACHE_MISSES_TOTAL,
            PENDING_CONSUMED_TOTAL,
            PENDING_DISCARDED_TOTAL,
            PENDING_PRODUCED_TOTAL,
            NEAR_DUPLICATE_SERVED_TOTAL,
            PATH_SYNTHESIS_TOTAL,
            PATH_SYNTHESIS_CONTENTION_TOTAL,
            GENERATION_TIMEOUTS_TOTAL,
            GENERATION_ERRORS_TOTAL,
            GENERATOR_REQUEST_DURATION_SECONDS,
        ] {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "bad metric name: {name}"
            );
        }
    }
}
