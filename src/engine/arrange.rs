//! Member arrangement.
//!
//! Every mode returns a permutation of member indices. An empty permutation
//! means "keep the current order"; a non-empty one is a bijection on
//! `0..members.len()`.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ArrangeConfig, ClassifyConfig};
use crate::engine::classifier::NearestCentroid;
use crate::engine::embedding::Isomap;
use crate::engine::member::Member;
use crate::engine::{check_vectors, NumericalError};

/// How members are ordered for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArrangeMode {
    /// Keep the collaborator's order.
    None,
    /// Ascending position along a 1-D manifold embedding.
    Similarity,
    /// Descending number of contained leaves.
    LeafCount,
    /// Descending maximum distance to the anchors.
    StarredSimilarity,
    /// Similarity order, alternating typical and atypical members.
    Interleaved,
    /// Anything else; arranged as `None` with a warning.
    Unknown(String),
}

impl FromStr for ArrangeMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "none" => ArrangeMode::None,
            "similarity" | "sim" => ArrangeMode::Similarity,
            "leaf-count" | "nleaves" => ArrangeMode::LeafCount,
            "starred-similarity" | "starred_sim" => ArrangeMode::StarredSimilarity,
            "interleaved" => ArrangeMode::Interleaved,
            other => ArrangeMode::Unknown(other.to_string()),
        })
    }
}

impl From<String> for ArrangeMode {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(mode) => mode,
            Err(never) => match never {},
        }
    }
}

impl From<ArrangeMode> for String {
    fn from(mode: ArrangeMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for ArrangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrangeMode::None => write!(f, "none"),
            ArrangeMode::Similarity => write!(f, "similarity"),
            ArrangeMode::LeafCount => write!(f, "leaf-count"),
            ArrangeMode::StarredSimilarity => write!(f, "starred-similarity"),
            ArrangeMode::Interleaved => write!(f, "interleaved"),
            ArrangeMode::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// The arrangement engine.
#[derive(Debug, Clone)]
pub struct Arranger {
    isomap: Isomap,
    fit_subsample: usize,
    seed: Option<u64>,
    classify: ClassifyConfig,
}

impl Arranger {
    pub fn new(arrange: &ArrangeConfig, classify: &ClassifyConfig) -> Self {
        Self {
            isomap: Isomap::new(arrange),
            fit_subsample: arrange.fit_subsample,
            seed: arrange.seed,
            classify: classify.clone(),
        }
    }

    /// Compute a permutation of `members` for `mode`.
    ///
    /// `anchors` is only read by [`ArrangeMode::StarredSimilarity`].
    pub fn arrange(
        &self,
        members: &[Member],
        mode: &ArrangeMode,
        anchors: &[Member],
    ) -> Result<Vec<usize>, NumericalError> {
        let order = match mode {
            ArrangeMode::None => Vec::new(),
            ArrangeMode::Similarity => self.by_similarity(members)?,
            ArrangeMode::LeafCount => by_leaf_count(members),
            ArrangeMode::StarredSimilarity => self.by_starred_similarity(members, anchors)?,
            ArrangeMode::Interleaved => interleave(&self.by_similarity(members)?),
            ArrangeMode::Unknown(name) => {
                warn!(arrange_by = %name, "Arrangement mode not supported, keeping order");
                Vec::new()
            }
        };

        debug_assert!(order.is_empty() || is_permutation(&order, members.len()));
        Ok(order)
    }

    /// Sort ascending along a one-dimensional Isomap embedding.
    pub fn by_similarity(&self, members: &[Member]) -> Result<Vec<usize>, NumericalError> {
        if members.len() <= self.isomap.n_neighbors {
            return Ok(Vec::new());
        }

        let vectors: Vec<&[f32]> = members.iter().map(Member::vector).collect();

        let fitted = if vectors.len() <= self.fit_subsample {
            self.isomap.fit(&vectors)?
        } else {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let idxs = rand::seq::index::sample(&mut rng, vectors.len(), self.fit_subsample);
            let subsample: Vec<&[f32]> = idxs.iter().map(|i| vectors[i]).collect();
            debug!(
                members = vectors.len(),
                subsample = subsample.len(),
                "Fitting embedding on subsample"
            );
            self.isomap.fit(&subsample)?
        };

        let coords = fitted.transform(&vectors)?;
        let mut order: Vec<usize> = (0..coords.len()).collect();
        order.sort_by(|&a, &b| coords[a].total_cmp(&coords[b]));
        Ok(order)
    }

    /// Sort descending by the largest distance to any anchor.
    ///
    /// Without anchors this falls back to [`Arranger::by_similarity`]. Malformed
    /// vectors keep the order instead of failing.
    pub fn by_starred_similarity(
        &self,
        members: &[Member],
        anchors: &[Member],
    ) -> Result<Vec<usize>, NumericalError> {
        if anchors.is_empty() {
            return self.by_similarity(members);
        }
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let vectors: Vec<&[f32]> = members.iter().map(Member::vector).collect();
        let centroids: Vec<Vec<f32>> = anchors.iter().map(|a| a.vector().to_vec()).collect();

        let distances = match check_vectors(&vectors)
            .and_then(|_| NearestCentroid::new(centroids, &self.classify))
            .and_then(|clf| clf.distances(&vectors))
        {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Cannot compare members with anchors, keeping order");
                return Ok(Vec::new());
            }
        };

        let max_dist: Vec<f32> = (0..members.len())
            .map(|m| distances.iter().map(|row| row[m]).fold(f32::NEG_INFINITY, f32::max))
            .collect();

        let mut order: Vec<usize> = (0..members.len()).collect();
        order.sort_by(|&a, &b| max_dist[b].total_cmp(&max_dist[a]));
        Ok(order)
    }
}

/// Sort descending by leaf count. Ties keep their relative order.
pub fn by_leaf_count(members: &[Member]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..members.len()).collect();
    order.sort_by(|&a, &b| members[b].n_leaves().cmp(&members[a].n_leaves()));
    order
}

/// First half on even positions, second half reversed on odd positions.
pub fn interleave(order: &[usize]) -> Vec<usize> {
    if order.is_empty() {
        return Vec::new();
    }
    let (first, second) = order.split_at(order.len().div_ceil(2));
    let mut result = vec![0; order.len()];
    for (slot, &idx) in result.iter_mut().step_by(2).zip(first) {
        *slot = idx;
    }
    for (slot, &idx) in result.iter_mut().skip(1).step_by(2).zip(second.iter().rev()) {
        *slot = idx;
    }
    result
}

/// Whether `order` is a bijection on `0..n`.
pub fn is_permutation(order: &[usize], n: usize) -> bool {
    if order.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    order
        .iter()
        .all(|&i| i < n && !std::mem::replace(&mut seen[i], true))
}
