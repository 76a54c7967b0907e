//! Arrangement and classification engine.
//!
//! Purely functional over member vectors:
//! - [`member`]: Member variants and the vector capability the engine reads
//! - [`embedding`]: one-dimensional Isomap embedding
//! - [`classifier`]: nearest-centroid classifier with optional rejection
//! - [`arrange`]: arrangement modes producing index permutations

pub mod arrange;
pub mod classifier;
pub mod embedding;
pub mod member;

use thiserror::Error;

/// Failure of a numerical routine on degenerate or malformed input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalError {
    #[error("Vector {index} has dimensionality {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Vector {0} contains non-finite values")]
    NonFinite(usize),

    #[error("{samples} samples cannot support a neighborhood of {n_neighbors}")]
    TooFewSamples { samples: usize, n_neighbors: usize },

    #[error("Classifier needs at least one anchor centroid")]
    NoAnchors,

    #[error("Eigen solver did not produce a finite eigenpair")]
    EigenSolver,
}

/// Check that all vectors share one dimensionality and are finite.
///
/// Returns the common dimensionality (0 for an empty slice).
pub fn check_vectors<V: AsRef<[f32]>>(vectors: &[V]) -> Result<usize, NumericalError> {
    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let dim = first.as_ref().len();

    for (index, v) in vectors.iter().enumerate() {
        let v = v.as_ref();
        if v.len() != dim {
            return Err(NumericalError::DimensionMismatch {
                index,
                expected: dim,
                found: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(NumericalError::NonFinite(index));
        }
    }

    Ok(dim)
}

/// Euclidean distance between two equally sized vectors.
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
