use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0];

/// Prometheus metrics for a quarry node
#[derive(Clone)]
pub struct SearchMetrics {
    // Counters
    pub documents_added: Counter,
    pub indices_created: Counter,
    pub searches_total: CounterVec,
    pub search_errors: Counter,
    pub forwarded_requests: CounterVec,

    // Gauges
    pub index_count: Gauge,
    pub cluster_leader: Gauge,
    pub cluster_size: Gauge,

    // Histograms
    pub add_latency: Histogram,
    pub search_latency: Histogram,

    registry: Arc<Registry>,
}

impl SearchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let documents_added = Counter::with_opts(Opts::new(
            "quarry_documents_added_total",
            "Documents accepted by this node as leader",
        ))?;
        registry.register(Box::new(documents_added.clone()))?;

        let indices_created = Counter::with_opts(Opts::new(
            "quarry_indices_created_total",
            "Indices created by this node as leader",
        ))?;
        registry.register(Box::new(indices_created.clone()))?;

        let searches_total = CounterVec::new(
            Opts::new("quarry_searches_total", "Full-text searches by index"),
            &["index"],
        )?;
        registry.register(Box::new(searches_total.clone()))?;

        let search_errors = Counter::with_opts(Opts::new(
            "quarry_search_errors_total",
            "Searches that returned an error",
        ))?;
        registry.register(Box::new(search_errors.clone()))?;

        let forwarded_requests = CounterVec::new(
            Opts::new(
                "quarry_forwarded_requests_total",
                "Write requests forwarded to the leader",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(forwarded_requests.clone()))?;

        let index_count = Gauge::with_opts(Opts::new(
            "quarry_indices",
            "Number of indices known to this node",
        ))?;
        registry.register(Box::new(index_count.clone()))?;

        let cluster_leader = Gauge::with_opts(Opts::new(
            "quarry_cluster_leader",
            "1 if this node is the leader, 0 otherwise",
        ))?;
        registry.register(Box::new(cluster_leader.clone()))?;

        let cluster_size = Gauge::with_opts(Opts::new(
            "quarry_cluster_size",
            "Number of nodes in the cluster",
        ))?;
        registry.register(Box::new(cluster_size.clone()))?;

        let add_latency = Histogram::with_opts(
            HistogramOpts::new(
                "quarry_add_document_latency_seconds",
                "Time from request to committed AddDocument",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(add_latency.clone()))?;

        let search_latency = Histogram::with_opts(
            HistogramOpts::new("quarry_search_latency_seconds", "Full-text search latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(search_latency.clone()))?;

        Ok(Self {
            documents_added,
            indices_created,
            searches_total,
            search_errors,
            forwarded_requests,
            index_count,
            cluster_leader,
            cluster_size,
            add_latency,
            search_latency,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn record_document_added(&self, duration_secs: f64) {
        self.documents_added.inc();
        self.add_latency.observe(duration_secs);
    }

    pub fn record_index_created(&self) {
        self.indices_created.inc();
    }

    pub fn record_search(&self, index: &str, duration_secs: f64) {
        self.searches_total.with_label_values(&[index]).inc();
        self.search_latency.observe(duration_secs);
    }

    pub fn record_search_error(&self) {
        self.search_errors.inc();
    }

    pub fn record_forward(&self, operation: &str) {
        self.forwarded_requests.with_label_values(&[operation]).inc();
    }

    pub fn set_index_count(&self, count: usize) {
        self.index_count.set(count as f64);
    }

    pub fn set_is_leader(&self, is_leader: bool) {
        self.cluster_leader.set(if is_leader { 1.0 } else { 0.0 });
    }

    pub fn set_cluster_size(&self, size: usize) {
        self.cluster_size.set(size as f64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_values() {
        let metrics = SearchMetrics::new().unwrap();
        metrics.record_search("books", 0.002);
        metrics.record_forward("create_index");
        metrics.record_index_created();

        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("quarry_searches_total{index=\"books\"} 1"));
        assert!(text.contains("quarry_forwarded_requests_total{operation=\"create_index\"} 1"));
        assert!(text.contains("quarry_indices_created_total 1"));
    }
}
