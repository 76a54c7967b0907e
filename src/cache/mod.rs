//! Paginated compute-and-cache layer.
//!
//! - [`store`]: ordered-list store abstraction and the in-memory store
//! - [`evictor`]: least-recently-used key selection for the in-memory store
//! - [`key`]: deterministic cache keys
//! - [`compressor`]: per-page zstd compression
//! - [`pager`]: paginate-and-cache plus pagination links
//! - [`metrics`]: prometheus counters for hits, misses and store failures

pub mod compressor;
pub mod evictor;
pub mod key;
pub mod metrics;
pub mod pager;
pub mod store;
