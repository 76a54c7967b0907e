//! Prometheus counters for the page cache.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Page cache counters, registered in their own registry.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    registry: Registry,
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub store_errors: IntCounter,
    pub pages_computed: IntCounter,
}

impl CacheMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let hits = IntCounter::new("page_cache_hits_total", "Pages served from the cache store")?;
        let misses = IntCounter::new("page_cache_misses_total", "Requests that recomputed their result")?;
        let store_errors = IntCounter::new(
            "page_cache_store_errors_total",
            "Cache store failures absorbed by recomputation",
        )?;
        let pages_computed = IntCounter::new("page_cache_pages_computed_total", "Pages produced by recomputation")?;

        registry.register(Box::new(hits.clone()))?;
        registry.register(Box::new(misses.clone()))?;
        registry.register(Box::new(store_errors.clone()))?;
        registry.register(Box::new(pages_computed.clone()))?;

        Ok(Self {
            registry,
            hits,
            misses,
            store_errors,
            pages_computed,
        })
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = CacheMetrics::new().unwrap();
        metrics.hits.inc();
        metrics.store_errors.inc_by(2);

        let text = metrics.render().unwrap();
        assert!(text.contains("page_cache_hits_total 1"));
        assert!(text.contains("page_cache_store_errors_total 2"));
    }
}
