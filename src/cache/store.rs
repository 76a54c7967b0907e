//! Ordered-list cache store.
//!
//! The pager only needs index reads, length, append and delete, so any
//! key/list backend can sit behind [`ListStore`]. [`MemoryListStore`]
//! keeps lists in process memory under a byte budget.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::evictor::{Evictor, ListUsage};
use crate::config::Config;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cached entry is corrupt: {0}")]
    Corrupt(String),
}

/// A store of named, append-only byte lists.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Element `index` of list `key`, `None` if the list or element is absent.
    async fn lindex(&self, key: &str, index: usize) -> Result<Option<Bytes>, StoreError>;

    /// Length of list `key` (0 if absent).
    async fn llen(&self, key: &str) -> Result<usize, StoreError>;

    /// Append `values` to list `key` in one operation; returns the new length.
    async fn rpush(&self, key: &str, values: Vec<Bytes>) -> Result<usize, StoreError>;

    /// Drop list `key`.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Usage snapshot, for backends that track one.
    async fn stats(&self) -> Option<StoreStats> {
        None
    }
}

/// Usage snapshot of a [`MemoryListStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub keys: usize,
    pub bytes_used: usize,
    pub evicted_keys: u64,
}

#[derive(Debug)]
struct StoredList {
    values: Vec<Bytes>,
    bytes: usize,
    last_access: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    lists: HashMap<String, StoredList>,
    bytes_used: usize,
    evicted_keys: u64,
}

/// In-process list store with least-recently-used eviction.
#[derive(Debug)]
pub struct MemoryListStore {
    inner: RwLock<Inner>,
    evictor: Evictor,
    high_bytes: usize,
    low_bytes: usize,
}

impl MemoryListStore {
    /// A store that evicts above `high_bytes` until usage falls to `low_bytes`.
    pub fn new(high_bytes: usize, low_bytes: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            evictor: Evictor::new(),
            high_bytes,
            low_bytes: low_bytes.min(high_bytes),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_high_bytes(), config.cache_low_bytes())
    }

    fn evict(&self, inner: &mut Inner, protected: &str) {
        if inner.bytes_used <= self.high_bytes {
            return;
        }
        let excess = inner.bytes_used - self.low_bytes;
        let victims = self.evictor.select_victims(
            inner.lists.iter().map(|(k, l)| {
                (
                    k,
                    ListUsage {
                        bytes: l.bytes,
                        last_access: l.last_access,
                    },
                )
            }),
            excess,
            &[protected],
        );

        for victim in victims {
            if let Some(list) = inner.lists.remove(&victim.key) {
                inner.bytes_used = inner.bytes_used.saturating_sub(list.bytes);
                inner.evicted_keys += 1;
                debug!(key = victim.key, bytes = list.bytes, "Evicted cache list");
            }
        }
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn lindex(&self, key: &str, index: usize) -> Result<Option<Bytes>, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.lists.get_mut(key).and_then(|list| {
            list.last_access = Instant::now();
            list.values.get(index).cloned()
        }))
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.lists.get(key).map_or(0, |l| l.values.len()))
    }

    async fn rpush(&self, key: &str, values: Vec<Bytes>) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let added: usize = values.iter().map(Bytes::len).sum();

        let list = inner.lists.entry(key.to_string()).or_insert_with(|| StoredList {
            values: Vec::new(),
            bytes: 0,
            last_access: Instant::now(),
        });
        list.values.extend(values);
        list.bytes += added;
        list.last_access = Instant::now();
        let len = list.values.len();

        inner.bytes_used += added;
        self.evict(&mut inner, key);
        Ok(len)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(list) = inner.lists.remove(key) {
            inner.bytes_used = inner.bytes_used.saturating_sub(list.bytes);
        }
        Ok(())
    }

    async fn stats(&self) -> Option<StoreStats> {
        let inner = self.inner.read().await;
        Some(StoreStats {
            keys: inner.lists.len(),
            bytes_used: inner.bytes_used,
            evicted_keys: inner.evicted_keys,
        })
    }
}
