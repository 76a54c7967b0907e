//! Nearest-centroid classifier.
//!
//! One class per anchor centroid. Safe classification rejects members whose
//! nearest and second-nearest anchors are too close to call, or whose nearest
//! anchor lies beyond a configured distance.

use crate::config::ClassifyConfig;
use crate::engine::{check_vectors, euclidean, NumericalError};

/// Assignment value of a rejected member.
pub const UNASSIGNED: i32 = -1;

/// A classifier built from anchor centroids.
#[derive(Debug, Clone)]
pub struct NearestCentroid {
    centroids: Vec<Vec<f32>>,
    dim: usize,
    safe_margin: f32,
    safe_max_distance: Option<f32>,
}

impl NearestCentroid {
    /// Build a classifier. Fails on an empty or malformed anchor set.
    pub fn new(centroids: Vec<Vec<f32>>, config: &ClassifyConfig) -> Result<Self, NumericalError> {
        if centroids.is_empty() {
            return Err(NumericalError::NoAnchors);
        }
        let dim = check_vectors(&centroids)?;

        Ok(Self {
            centroids,
            dim,
            safe_margin: config.safe_margin,
            safe_max_distance: config.safe_max_distance,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.centroids.len()
    }

    /// Distance matrix indexed `[class][member]`.
    pub fn distances<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<Vec<Vec<f32>>, NumericalError> {
        self.check(vectors)?;

        Ok(self
            .centroids
            .iter()
            .map(|c| vectors.iter().map(|v| euclidean(c, v.as_ref())).collect())
            .collect())
    }

    /// Class index per member, or [`UNASSIGNED`] when `safe` rejects it.
    pub fn classify<V: AsRef<[f32]>>(&self, vectors: &[V], safe: bool) -> Result<Vec<i32>, NumericalError> {
        let distances = self.distances(vectors)?;

        Ok((0..vectors.len())
            .map(|member| {
                let (mut best, mut d1, mut d2) = (0usize, f32::INFINITY, f32::INFINITY);
                for (class, row) in distances.iter().enumerate() {
                    let d = row[member];
                    if d < d1 {
                        d2 = d1;
                        d1 = d;
                        best = class;
                    } else if d < d2 {
                        d2 = d;
                    }
                }

                if safe && self.reject(d1, d2) {
                    UNASSIGNED
                } else {
                    best as i32
                }
            })
            .collect())
    }

    fn reject(&self, d1: f32, d2: f32) -> bool {
        if let Some(max) = self.safe_max_distance {
            if d1 > max {
                return true;
            }
        }
        // d2 is infinite with a single anchor: only the distance rule applies.
        d2.is_finite() && d2 > 0.0 && (d2 - d1) / d2 < self.safe_margin
    }

    fn check<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<(), NumericalError> {
        let dim = check_vectors(vectors)?;
        if !vectors.is_empty() && dim != self.dim {
            return Err(NumericalError::DimensionMismatch {
                index: 0,
                expected: self.dim,
                found: dim,
            });
        }
        Ok(())
    }
}
