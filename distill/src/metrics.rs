//! Search observability metrics
//!
//! Prometheus-compatible counters and histograms for collection and
//! aggregate searches. Recording is a no-op until the embedding application
//! installs a recorder.

use std::time::Duration;

/// Record how long a backend took to execute a collection query
pub fn record_collection_search_duration(collection: &str, duration: Duration) {
    metrics::histogram!(
        "distill_collection_search_duration_seconds",
        "collection" => collection.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a successful collection search
pub fn record_collection_search_success(collection: &str) {
    metrics::counter!(
        "distill_collection_searches_total",
        "collection" => collection.to_string(),
        "status" => "ok",
    )
    .increment(1);
}

/// Record a failed collection search
pub fn record_collection_search_error(collection: &str, error_type: &str) {
    metrics::counter!(
        "distill_collection_searches_total",
        "collection" => collection.to_string(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "distill_collection_errors_total",
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record one aggregate search and its combined hit count
pub fn record_aggregate_search(collections: usize, failed: usize, hits: usize) {
    metrics::counter!("distill_aggregate_searches_total").increment(1);
    metrics::histogram!("distill_aggregate_collections").record(collections as f64);
    metrics::histogram!("distill_aggregate_hits").record(hits as f64);
    if failed > 0 {
        metrics::counter!("distill_aggregate_partial_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_collection_search_duration("db.posts", Duration::from_millis(3));
        record_collection_search_success("db.posts");
        record_collection_search_error("db.posts", "backend");
        record_aggregate_search(3, 1, 10);
    }
}
