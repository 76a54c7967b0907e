//! Error taxonomy of the explorer.
//!
//! Validation and numerical errors reach the request boundary. Cache store
//! failures never get here: the pager absorbs them. Structural no-ops (no
//! anchors, too few members) are not errors at all.

use thiserror::Error;

use crate::engine::NumericalError;
use crate::tree::TreeError;

#[derive(Error, Debug)]
pub enum ExploreError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Numerical failure: {0}")]
    Numerical(#[from] NumericalError),

    #[error("Tree operation failed: {0}")]
    Tree(#[from] TreeError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
