//! cluster-explorer: member arrangement, classification and paginated result
//! caching for hierarchically clustered collections.
//!
//! The [`engine`] orders and classifies feature vectors, [`explore`] runs the
//! caller-facing computations against a [`tree`] backend, [`cache`] memoizes
//! their results page by page and [`server`] exposes them over HTTP.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod explore;
pub mod server;
pub mod tree;
