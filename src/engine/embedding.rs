//! One-dimensional Isomap embedding.
//!
//! Fitting builds a symmetric kNN graph, computes geodesic distances with
//! Dijkstra, double-centres the squared geodesics into a kernel and extracts
//! the leading eigenpair by shifted power iteration. New points are placed by
//! routing through their k nearest fitted samples.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use tracing::{debug, warn};

use crate::config::ArrangeConfig;
use crate::engine::{check_vectors, NumericalError};

/// Eigenvalues below this are treated as a collapsed embedding.
const EIGEN_EPS: f64 = 1e-12;

/// Isomap parameters.
#[derive(Debug, Clone)]
pub struct Isomap {
    pub n_neighbors: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// A fitted model able to embed arbitrary vectors of the fitted dimensionality.
#[derive(Debug, Clone)]
pub struct FittedIsomap {
    n_neighbors: usize,
    samples: Vec<Vec<f64>>,
    /// Geodesic distances between fitted samples.
    geodesic: Vec<Vec<f64>>,
    /// Column means of the uncentred kernel `-0.5 * G∘G`.
    kernel_col_means: Vec<f64>,
    kernel_mean: f64,
    eigenvector: Vec<f64>,
    eigenvalue: f64,
}

/// Min-heap entry for Dijkstra.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    dist: f64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that BinaryHeap pops the smallest distance first.
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist.total_cmp(&self.dist)
    }
}

impl Isomap {
    pub fn new(config: &ArrangeConfig) -> Self {
        Self {
            n_neighbors: config.n_neighbors,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }

    /// Fit the embedding on `samples`.
    pub fn fit<V: AsRef<[f32]>>(&self, samples: &[V]) -> Result<FittedIsomap, NumericalError> {
        check_vectors(samples)?;
        let m = samples.len();
        if self.n_neighbors == 0 || m <= self.n_neighbors {
            return Err(NumericalError::TooFewSamples {
                samples: m,
                n_neighbors: self.n_neighbors,
            });
        }

        let points: Vec<Vec<f64>> = samples
            .iter()
            .map(|v| v.as_ref().iter().map(|&x| x as f64).collect())
            .collect();

        let dist = pairwise(&points);
        let mut graph = knn_graph(&dist, self.n_neighbors);
        let joined = join_components(&dist, &mut graph);
        if joined > 0 {
            debug!(joined, "Joined disconnected kNN components");
        }

        let geodesic: Vec<Vec<f64>> = (0..m).map(|s| dijkstra(&graph, s)).collect();

        // Uncentred kernel statistics; the kernel is symmetric so row and column means agree.
        let mut kernel_col_means = vec![0.0; m];
        for row in &geodesic {
            for (j, g) in row.iter().enumerate() {
                kernel_col_means[j] += -0.5 * g * g;
            }
        }
        for c in &mut kernel_col_means {
            *c /= m as f64;
        }
        let kernel_mean = kernel_col_means.iter().sum::<f64>() / m as f64;

        let centred: Vec<Vec<f64>> = geodesic
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, g)| {
                        -0.5 * g * g - kernel_col_means[j] - kernel_col_means[i] + kernel_mean
                    })
                    .collect()
            })
            .collect();

        let (eigenvalue, eigenvector) = self.leading_eigenpair(&centred)?;
        debug!(samples = m, eigenvalue, "Fitted isomap");

        Ok(FittedIsomap {
            n_neighbors: self.n_neighbors,
            samples: points,
            geodesic,
            kernel_col_means,
            kernel_mean,
            eigenvector,
            eigenvalue,
        })
    }

    /// Largest algebraic eigenpair of a symmetric, double-centred matrix.
    fn leading_eigenpair(&self, matrix: &[Vec<f64>]) -> Result<(f64, Vec<f64>), NumericalError> {
        let m = matrix.len();

        // Gershgorin bound: shifting by it makes the spectrum non-negative.
        let shift = matrix
            .iter()
            .map(|row| row.iter().map(|x| x.abs()).sum::<f64>())
            .fold(0.0, f64::max);

        if shift <= EIGEN_EPS {
            return Ok((0.0, vec![0.0; m]));
        }

        // Non-constant start; the constant vector lies in the kernel's null space.
        let mut v: Vec<f64> = (0..m)
            .map(|i| ((i * 7919 + 13) % 101) as f64 / 101.0 - 0.5)
            .collect();
        center_and_normalize(&mut v).ok_or(NumericalError::EigenSolver)?;

        let mut lambda = 0.0;
        let mut change = f64::INFINITY;
        for iteration in 0..self.max_iterations {
            let mut w: Vec<f64> = matrix
                .iter()
                .zip(&v)
                .map(|(row, vi)| row.iter().zip(&v).map(|(a, b)| a * b).sum::<f64>() + shift * vi)
                .collect();

            lambda = w.iter().zip(&v).map(|(a, b)| a * b).sum();
            if center_and_normalize(&mut w).is_none() {
                // The iterate fell entirely into the null space.
                return Ok((0.0, vec![0.0; m]));
            }

            change = w
                .iter()
                .zip(&v)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            v = w;
            if change <= self.tolerance {
                debug!(iteration, "Power iteration converged");
                break;
            }
        }
        if change > self.tolerance {
            warn!(
                max_iterations = self.max_iterations,
                change,
                tolerance = self.tolerance,
                "Power iteration did not converge, using last iterate"
            );
        }

        let eigenvalue = lambda - shift;
        if !eigenvalue.is_finite() || v.iter().any(|x| !x.is_finite()) {
            return Err(NumericalError::EigenSolver);
        }

        // Fix the sign so the result is deterministic.
        let pivot = v
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(0.0);
        if pivot < 0.0 {
            v.iter_mut().for_each(|x| *x = -*x);
        }

        Ok((eigenvalue.max(0.0), v))
    }
}

impl FittedIsomap {
    /// Coordinates of the fitted samples.
    pub fn embedding(&self) -> Vec<f64> {
        let scale = self.eigenvalue.sqrt();
        self.eigenvector.iter().map(|v| v * scale).collect()
    }

    /// Embed `vectors` with the fitted model.
    pub fn transform<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<Vec<f64>, NumericalError> {
        let dim = check_vectors(vectors)?;
        let fitted_dim = self.samples[0].len();
        if !vectors.is_empty() && dim != fitted_dim {
            return Err(NumericalError::DimensionMismatch {
                index: 0,
                expected: fitted_dim,
                found: dim,
            });
        }

        if self.eigenvalue <= EIGEN_EPS {
            return Ok(vec![0.0; vectors.len()]);
        }
        let scale = self.eigenvalue.sqrt();
        let m = self.samples.len();
        let k = self.n_neighbors.min(m);

        let coords = vectors
            .iter()
            .map(|y| {
                let y: Vec<f64> = y.as_ref().iter().map(|&x| x as f64).collect();
                let mut nearest: Vec<(usize, f64)> = self
                    .samples
                    .iter()
                    .enumerate()
                    .map(|(j, s)| (j, distance(&y, s)))
                    .collect();
                nearest.sort_by(|a, b| a.1.total_cmp(&b.1));
                nearest.truncate(k);

                let kernel_row: Vec<f64> = (0..m)
                    .map(|i| {
                        let g = nearest
                            .iter()
                            .map(|&(j, d)| d + self.geodesic[j][i])
                            .fold(f64::INFINITY, f64::min);
                        -0.5 * g * g
                    })
                    .collect();
                let row_mean = kernel_row.iter().sum::<f64>() / m as f64;

                kernel_row
                    .iter()
                    .enumerate()
                    .map(|(i, kv)| {
                        (kv - self.kernel_col_means[i] - row_mean + self.kernel_mean)
                            * self.eigenvector[i]
                    })
                    .sum::<f64>()
                    / scale
            })
            .collect();

        Ok(coords)
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn pairwise(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let m = points.len();
    let mut dist = vec![vec![0.0; m]; m];
    for i in 0..m {
        for j in (i + 1)..m {
            let d = distance(&points[i], &points[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }
    dist
}

/// Symmetric adjacency lists of the k-nearest-neighbor graph.
fn knn_graph(dist: &[Vec<f64>], k: usize) -> Vec<Vec<(usize, f64)>> {
    let m = dist.len();
    let mut graph = vec![Vec::new(); m];
    for i in 0..m {
        let mut others: Vec<usize> = (0..m).filter(|&j| j != i).collect();
        others.sort_by(|&a, &b| dist[i][a].total_cmp(&dist[i][b]));
        for &j in others.iter().take(k) {
            graph[i].push((j, dist[i][j]));
            graph[j].push((i, dist[i][j]));
        }
    }
    graph
}

/// Connect every pair of components through their closest members.
///
/// Returns the number of edges added.
fn join_components(dist: &[Vec<f64>], graph: &mut [Vec<(usize, f64)>]) -> usize {
    let m = graph.len();
    let mut label = vec![usize::MAX; m];
    let mut n_components = 0;
    for start in 0..m {
        if label[start] != usize::MAX {
            continue;
        }
        let mut queue = VecDeque::from([start]);
        label[start] = n_components;
        while let Some(u) = queue.pop_front() {
            for &(v, _) in &graph[u] {
                if label[v] == usize::MAX {
                    label[v] = n_components;
                    queue.push_back(v);
                }
            }
        }
        n_components += 1;
    }

    let mut added = 0;
    for a in 0..n_components {
        for b in (a + 1)..n_components {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in (0..m).filter(|&i| label[i] == a) {
                for j in (0..m).filter(|&j| label[j] == b) {
                    if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                        best = Some((i, j, dist[i][j]));
                    }
                }
            }
            if let Some((i, j, d)) = best {
                graph[i].push((j, d));
                graph[j].push((i, d));
                added += 1;
            }
        }
    }
    added
}

fn dijkstra(graph: &[Vec<(usize, f64)>], source: usize) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; graph.len()];
    let mut heap = BinaryHeap::new();
    dist[source] = 0.0;
    heap.push(Frontier {
        dist: 0.0,
        node: source,
    });

    while let Some(Frontier { dist: d, node }) = heap.pop() {
        if d > dist[node] {
            continue;
        }
        for &(next, w) in &graph[node] {
            let candidate = d + w;
            if candidate < dist[next] {
                dist[next] = candidate;
                heap.push(Frontier {
                    dist: candidate,
                    node: next,
                });
            }
        }
    }
    dist
}

/// Remove the mean and scale to unit length. `None` if the result vanishes.
fn center_and_normalize(v: &mut [f64]) -> Option<()> {
    let mean = v.iter().sum::<f64>() / v.len() as f64;
    v.iter_mut().for_each(|x| *x -= mean);
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !(norm > EIGEN_EPS) {
        return None;
    }
    v.iter_mut().for_each(|x| *x /= norm);
    Some(())
}
