//! Paginate-and-cache: the central coordinator of the cache layer.
//!
//! A computation producing a list is memoized page by page under a key built
//! from (operation, sorted parameters, client session). The pager:
//! - Serves single pages straight from the store's list for that key
//! - Recomputes, pages, compresses and appends on a miss
//! - Treats every store failure as a miss, so the store is never a
//!   correctness dependency
//! - Builds `Link` headers so clients can walk the pages of a session

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::compressor::PageCompressor;
use crate::cache::key::{cache_key, Params};
use crate::cache::metrics::CacheMetrics;
use crate::cache::store::{ListStore, StoreError};

/// Body of an empty or out-of-range page.
pub const EMPTY_PAGE: &str = "[]";

/// One page of a cached result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Serialized JSON array.
    pub body: String,
    pub page: usize,
    pub n_pages: usize,
    /// Whether the body came from the store.
    pub cached: bool,
}

/// Identity of the requested page.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub operation: &'a str,
    pub params: &'a Params,
    pub session: &'a str,
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest<'_> {
    pub fn cache_key(&self) -> String {
        cache_key(self.operation, self.params, self.session)
    }
}

/// Page cache over any [`ListStore`].
pub struct PageCache<S: ?Sized> {
    store: Arc<S>,
    compressor: PageCompressor,
    metrics: CacheMetrics,
}

impl<S: ListStore + ?Sized> PageCache<S> {
    pub fn new(store: Arc<S>, compressor: PageCompressor, metrics: CacheMetrics) -> Self {
        Self {
            store,
            compressor,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Return the requested page, computing and caching the full result on a miss.
    ///
    /// Fails only if `compute` fails or its items cannot be serialized.
    pub async fn paginate_and_cache<T, E, F, Fut>(&self, request: &PageRequest<'_>, compute: F) -> Result<Page, E>
    where
        T: Serialize,
        E: From<serde_json::Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let key = request.cache_key();

        match self.load(&key, request.page).await {
            Ok(Some((body, n_pages))) => {
                self.metrics.hits.inc();
                debug!(cache_key = %key, page = request.page, n_pages, "Page served from cache");
                return Ok(Page {
                    body,
                    page: request.page,
                    n_pages,
                    cached: true,
                });
            }
            Ok(None) => {}
            Err(e) => {
                self.metrics.store_errors.inc();
                warn!(cache_key = %key, error = %e, "Cache read failed, recomputing");
                if matches!(e, StoreError::Corrupt(_)) {
                    if let Err(e) = self.store.delete(&key).await {
                        warn!(cache_key = %key, error = %e, "Could not drop corrupt entry");
                    }
                }
            }
        }

        self.metrics.misses.inc();
        let pages = {
            let result = compute().await?;
            paginate(&result, request.page_size)?
        };
        let n_pages = pages.len();
        self.metrics.pages_computed.inc_by(n_pages as u64);
        info!(cache_key = %key, n_pages, "Computed result");

        if n_pages > 0 {
            self.store_pages(&key, &pages).await;
        }

        let body = pages
            .into_iter()
            .nth(request.page)
            .unwrap_or_else(|| EMPTY_PAGE.to_string());

        Ok(Page {
            body,
            page: request.page,
            n_pages,
            cached: false,
        })
    }

    /// Read one page and the list length. `None` when nothing is cached for `key`.
    async fn load(&self, key: &str, page: usize) -> Result<Option<(String, usize)>, StoreError> {
        match self.store.lindex(key, page).await? {
            Some(raw) => {
                let n_pages = self.store.llen(key).await?;
                let body = self
                    .compressor
                    .decode(&raw)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                Ok(Some((body, n_pages)))
            }
            None => {
                // Past the end of a populated list: answer without recomputing.
                let n_pages = self.store.llen(key).await?;
                Ok((n_pages > 0).then(|| (EMPTY_PAGE.to_string(), n_pages)))
            }
        }
    }

    /// Compress and append all pages. Failures are logged and dropped.
    async fn store_pages(&self, key: &str, pages: &[String]) {
        let encoded: Result<Vec<Bytes>, _> = pages.iter().map(|p| self.compressor.encode(p)).collect();
        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Could not encode pages, skipping cache");
                return;
            }
        };

        if self.compressor.is_enabled() {
            let raw: usize = pages.iter().map(String::len).sum();
            let compressed: usize = encoded.iter().map(Bytes::len).sum();
            debug!(cache_key = %key, raw, compressed, "Compressed pages");
        }

        if let Err(e) = self.store.rpush(key, encoded).await {
            self.metrics.store_errors.inc();
            warn!(cache_key = %key, error = %e, "Cache write failed");
        }
    }
}

/// Serialize consecutive chunks of `page_size` items as JSON arrays.
pub fn paginate<T: Serialize>(items: &[T], page_size: usize) -> Result<Vec<String>, serde_json::Error> {
    items.chunks(page_size.max(1)).map(serde_json::to_string).collect()
}

/// Links to neighbouring pages of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLinks {
    pub previous: Option<String>,
    pub next: Option<String>,
    pub last: String,
}

impl PageLinks {
    /// Links for `page` of `n_pages`, each reproducing `query` plus session and page.
    pub fn new(path: &str, query: &BTreeMap<String, String>, session: &str, page: usize, n_pages: usize) -> Self {
        let url = |target: usize| page_url(path, query, session, target);

        Self {
            previous: (0 < page && page < n_pages).then(|| url(page - 1)),
            next: (page + 1 < n_pages).then(|| url(page + 1)),
            last: url(n_pages.saturating_sub(1)),
        }
    }

    /// `Link` header value.
    pub fn to_header(&self) -> String {
        let mut fields = Vec::with_capacity(3);
        if let Some(previous) = &self.previous {
            fields.push(format!("<{previous}>; rel=\"previous\""));
        }
        if let Some(next) = &self.next {
            fields.push(format!("<{next}>; rel=\"next\""));
        }
        fields.push(format!("<{}>; rel=\"last\"", self.last));
        fields.join(",")
    }
}

fn page_url(path: &str, query: &BTreeMap<String, String>, session: &str, page: usize) -> String {
    let mut parts: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    parts.push(format!("request_id={}", urlencoding::encode(session)));
    parts.push(format!("page={page}"));
    format!("{path}?{}", parts.join("&"))
}
