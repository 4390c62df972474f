//! Prometheus metric primitives (§4.9): HTTP RED metrics plus the business
//! counters/histograms/gauges the Lesson Engine and Persistence Gateway
//! report into. Backed by `prometheus-client`'s atomic, pre-aggregated
//! bucket counters rather than a raw-observation list recomputed per
//! scrape (§9, resolved open question).

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

pub const LATENCY_BUCKETS: [f64; 11] =
    [0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0];

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct HttpLabels {
    method: String,
    path: String,
    status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RouteLabels {
    method: String,
    path: String,
}

pub struct Metrics {
    registry: Registry,
    http_requests_total: Family<HttpLabels, Counter>,
    http_request_duration_seconds: Family<RouteLabels, Histogram>,
    lessons_saved_total: Counter,
    recall_queries_total: Counter,
    embedding_latency_seconds: Histogram,
    vector_search_latency_seconds: Histogram,
    db_pool_size: Gauge,
    db_pool_available: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests_total = Family::<HttpLabels, Counter>::default();
        // `Counter`'s exposition appends `_total` itself; registering under
        // the already-suffixed name would double it to `..._total_total`.
        registry.register("http_requests", "Total HTTP requests", http_requests_total.clone());

        let http_request_duration_seconds =
            Family::<RouteLabels, Histogram>::new_with_constructor(|| Histogram::new(LATENCY_BUCKETS.into_iter()));
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency",
            http_request_duration_seconds.clone(),
        );

        let lessons_saved_total = Counter::default();
        registry.register("lore_lessons_saved", "Lessons created", lessons_saved_total.clone());

        let recall_queries_total = Counter::default();
        registry.register("lore_recall_queries", "Recall queries served", recall_queries_total.clone());

        let embedding_latency_seconds = Histogram::new(LATENCY_BUCKETS.into_iter());
        registry.register(
            "lore_embedding_latency_seconds",
            "Client-reported embedding latency",
            embedding_latency_seconds.clone(),
        );

        let vector_search_latency_seconds = Histogram::new(LATENCY_BUCKETS.into_iter());
        registry.register(
            "lore_vector_search_latency_seconds",
            "pgvector search latency",
            vector_search_latency_seconds.clone(),
        );

        let db_pool_size = Gauge::default();
        registry.register("lore_db_pool_size", "Configured pool size", db_pool_size.clone());

        let db_pool_available = Gauge::default();
        registry.register("lore_db_pool_available", "Idle pool connections", db_pool_available.clone());

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            lessons_saved_total,
            recall_queries_total,
            embedding_latency_seconds,
            vector_search_latency_seconds,
            db_pool_size,
            db_pool_available,
        }
    }

    /// Access for `/metrics` and `/health` is excluded by the caller before
    /// this is invoked, to bound label cardinality (§4.4).
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, latency_seconds: f64) {
        let normalized_path = crate::path::normalize(path);
        self.http_requests_total
            .get_or_create(&HttpLabels {
                method: method.to_string(),
                path: normalized_path.clone(),
                status: status.to_string(),
            })
            .inc();
        self.http_request_duration_seconds
            .get_or_create(&RouteLabels { method: method.to_string(), path: normalized_path })
            .observe(latency_seconds);
    }

    pub fn record_lesson_saved(&self) {
        self.lessons_saved_total.inc();
    }

    pub fn record_recall_query(&self) {
        self.recall_queries_total.inc();
    }

    pub fn observe_embedding_latency(&self, seconds: f64) {
        self.embedding_latency_seconds.observe(seconds);
    }

    pub fn observe_vector_search_latency(&self, seconds: f64) {
        self.vector_search_latency_seconds.observe(seconds);
    }

    pub fn set_db_pool_size(&self, size: i64) {
        self.db_pool_size.set(size);
    }

    pub fn set_db_pool_available(&self, available: i64) {
        self.db_pool_available.set(available);
    }

    /// Standard Prometheus text exposition.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding into a String never fails");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_requests_appear_in_the_text_exposition() {
        let metrics = Metrics::new();
        metrics.record_http_request("GET", "/v1/lessons/42", 200, 0.012);
        let output = metrics.encode();
        assert!(output.contains("http_requests_total"));
        assert!(!output.contains("http_requests_total_total"));
        assert!(output.contains("path=\"/v1/lessons/:id\""));
    }

    #[test]
    fn business_counters_increment() {
        let metrics = Metrics::new();
        metrics.record_lesson_saved();
        metrics.record_recall_query();
        let output = metrics.encode();
        assert!(output.contains("lore_lessons_saved_total 1"));
        assert!(output.contains("lore_recall_queries_total 1"));
    }
}
