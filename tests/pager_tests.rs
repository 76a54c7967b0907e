//! Integration tests for the paginated compute-and-cache layer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use cluster_explorer::cache::compressor::PageCompressor;
use cluster_explorer::cache::key::{to_params, Params};
use cluster_explorer::cache::metrics::CacheMetrics;
use cluster_explorer::cache::pager::{PageCache, PageRequest};
use cluster_explorer::cache::store::{ListStore, MemoryListStore, StoreError};
use cluster_explorer::config::CacheConfig;

/// A store whose every operation fails.
struct FailingStore;

#[async_trait]
impl ListStore for FailingStore {
    async fn lindex(&self, _key: &str, _index: usize) -> Result<Option<Bytes>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn llen(&self, _key: &str) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn rpush(&self, _key: &str, _values: Vec<Bytes>) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

fn page_cache<S: ListStore>(store: S, compress: bool) -> PageCache<S> {
    let config = CacheConfig {
        compress,
        ..Default::default()
    };
    PageCache::new(Arc::new(store), PageCompressor::new(&config), CacheMetrics::new().unwrap())
}

fn request<'a>(params: &'a Params, session: &'a str, page: usize) -> PageRequest<'a> {
    PageRequest {
        operation: "node_members",
        params,
        session,
        page,
        page_size: 100,
    }
}

fn params() -> Params {
    to_params(&serde_json::json!({ "node_id": 4, "nodes": true, "arrange_by": "similarity" })).unwrap()
}

#[tokio::test]
async fn test_failing_store_still_serves_pages() {
    let cache = page_cache(FailingStore, true);
    let params = params();
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let compute = move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, serde_json::Error>((0..250).collect::<Vec<u32>>())
    };

    let page = cache.paginate_and_cache(&request(&params, "s", 0), compute).await.unwrap();
    let items: Vec<u32> = serde_json::from_str(&page.body).unwrap();
    assert_eq!(items, (0..100).collect::<Vec<_>>());
    assert_eq!(page.n_pages, 3);
    assert!(!page.cached);

    // Nothing was cached, so the next request recomputes.
    let last = cache.paginate_and_cache(&request(&params, "s", 2), compute).await.unwrap();
    assert_eq!(serde_json::from_str::<Vec<u32>>(&last.body).unwrap().len(), 50);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.metrics().store_errors.get(), 4);
}

#[tokio::test]
async fn test_sessions_are_cached_separately() {
    let cache = page_cache(MemoryListStore::new(1 << 20, 1 << 19), true);
    let params = params();
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let compute = move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, serde_json::Error>(vec!["x"; 120])
    };

    cache.paginate_and_cache(&request(&params, "a", 0), compute).await.unwrap();
    let hit = cache.paginate_and_cache(&request(&params, "a", 1), compute).await.unwrap();
    assert!(hit.cached);
    let other = cache.paginate_and_cache(&request(&params, "b", 1), compute).await.unwrap();
    assert!(!other.cached);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.store().stats().await.unwrap().keys, 2);
}

#[tokio::test]
async fn test_corrupt_entry_is_replaced() {
    let cache = page_cache(MemoryListStore::new(1 << 20, 1 << 19), true);
    let params = params();
    let key = request(&params, "s", 0).cache_key();
    cache
        .store()
        .rpush(&key, vec![Bytes::from_static(b"not zstd")])
        .await
        .unwrap();

    let page = cache
        .paginate_and_cache(&request(&params, "s", 0), || async {
            Ok::<_, serde_json::Error>(vec![1, 2, 3])
        })
        .await
        .unwrap();
    assert_eq!(page.body, "[1,2,3]");
    assert_eq!(cache.store().llen(&key).await.unwrap(), 1);
    assert_eq!(cache.metrics().store_errors.get(), 1);

    let hit = cache
        .paginate_and_cache(&request(&params, "s", 0), || async {
            Ok::<Vec<i32>, serde_json::Error>(vec![])
        })
        .await
        .unwrap();
    assert!(hit.cached);
    assert_eq!(hit.body, "[1,2,3]");
}

#[tokio::test]
async fn test_uncompressed_pages_stored_verbatim() {
    let cache = page_cache(MemoryListStore::new(1 << 20, 1 << 19), false);
    let params = params();
    cache
        .paginate_and_cache(&request(&params, "s", 0), || async {
            Ok::<_, serde_json::Error>(vec!["a", "b"])
        })
        .await
        .unwrap();

    let key = request(&params, "s", 0).cache_key();
    let raw = cache.store().lindex(&key, 0).await.unwrap().unwrap();
    assert_eq!(&raw[..], br#"["a","b"]"#);
}

#[tokio::test]
async fn test_walking_every_page_reassembles_the_list() {
    let full: Vec<u32> = (0..257).collect();

    for compress in [true, false] {
        let cache = page_cache(MemoryListStore::new(1 << 20, 1 << 19), compress);
        let params = params();
        let calls = AtomicUsize::new(0);
        let (counter, items) = (&calls, &full);
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, serde_json::Error>(items.clone())
        };

        let mut walked = Vec::new();
        let mut page = 0;
        loop {
            let request = PageRequest {
                page_size: 10,
                ..request(&params, "walk", page)
            };
            let result = cache.paginate_and_cache(&request, compute).await.unwrap();
            assert_eq!(result.n_pages, 26);
            assert_eq!(result.cached, page > 0);
            walked.extend(serde_json::from_str::<Vec<u32>>(&result.body).unwrap());

            page += 1;
            if page == result.n_pages {
                break;
            }
        }

        assert_eq!(walked, full);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Past the end of a cached list: empty, no recomputation.
        let beyond = PageRequest {
            page_size: 10,
            ..request(&params, "walk", 26)
        };
        let empty = cache.paginate_and_cache(&beyond, compute).await.unwrap();
        assert_eq!(empty.body, "[]");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A session entering mid-list computes once, then walks the rest from cache.
        let mut tail = Vec::new();
        for page in 13..26 {
            let request = PageRequest {
                page_size: 10,
                ..request(&params, "late", page)
            };
            let result = cache.paginate_and_cache(&request, compute).await.unwrap();
            assert_eq!(result.cached, page > 13);
            tail.extend(serde_json::from_str::<Vec<u32>>(&result.body).unwrap());
        }
        assert_eq!(tail, full[130..]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
