//! Centroid-based partitioning and the silhouette coefficient used to score
//! a partition. Fits run on linfa-clustering's k-means (k-means++ seeding,
//! best of `n_runs` by inertia).
//!
//! RULE: every random draw comes from the StageRng handed in, so a fit is a
//! pure function of (points, k, restarts, iteration cap, stage seed).

use crate::{
    error::SegResult,
    linalg::{euclidean_distance, squared_distance},
    rng::StageRng,
    types::ClusterLabel,
};
use linfa::{
    traits::{Fit, Predict},
    Dataset,
};
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2, Axis};

/// Result of one k-means fit (best of all restarts).
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels:  Vec<ClusterLabel>,
    /// k × m cluster centers.
    pub centers: Array2<f64>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
}

impl KMeansFit {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centers.nrows()];
        for &label in &self.labels {
            if label < sizes.len() {
                sizes[label] += 1;
            }
        }
        sizes
    }

    pub fn non_empty_clusters(&self) -> usize {
        self.cluster_sizes().iter().filter(|&&s| s > 0).count()
    }
}

/// Fit k clusters, keeping the lowest-inertia of `restarts` runs.
///
/// When the points hold no more than k distinct positions, each distinct
/// position is its own cluster (in order of first appearance) and the
/// remaining labels stay empty. That is the zero-inertia optimum, and it
/// keeps k-means++ from sampling with all-zero weights.
pub fn fit_kmeans(
    points: &Array2<f64>,
    k: usize,
    restarts: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &StageRng,
) -> SegResult<KMeansFit> {
    let k = k.max(1);
    let (positions, first_rows) = distinct_positions(points);
    if first_rows.len() <= k {
        return Ok(exact_fit(points, k, positions, &first_rows));
    }

    let dataset = Dataset::new(points.clone(), Array1::<usize>::zeros(points.nrows()));
    let model = KMeans::params_with_rng(k, rng.generator())
        .n_runs(restarts.max(1))
        .max_n_iterations(max_iterations.max(1) as u64)
        .tolerance(tolerance)
        .fit(&dataset)?;

    let predicted: Array1<usize> = model.predict(points);
    let labels = predicted.to_vec();
    let centers = model.centroids().clone();
    let inertia = inertia(points, &labels, &centers);
    Ok(KMeansFit { labels, centers, inertia })
}

/// For each row, the index of its distinct position; plus the first row
/// holding each distinct position.
fn distinct_positions(points: &Array2<f64>) -> (Vec<usize>, Vec<usize>) {
    let mut first_rows: Vec<usize> = Vec::new();
    let positions = points
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(i, row)| match first_rows.iter().position(|&r| points.row(r) == row) {
            Some(p) => p,
            None => {
                first_rows.push(i);
                first_rows.len() - 1
            }
        })
        .collect();
    (positions, first_rows)
}

fn exact_fit(points: &Array2<f64>, k: usize, labels: Vec<usize>, first_rows: &[usize]) -> KMeansFit {
    let mut centers = Array2::<f64>::zeros((k, points.ncols()));
    for (c, &row) in first_rows.iter().enumerate() {
        centers.row_mut(c).assign(&points.row(row));
    }
    KMeansFit { labels, centers, inertia: 0.0 }
}

fn inertia(points: &Array2<f64>, labels: &[ClusterLabel], centers: &Array2<f64>) -> f64 {
    points
        .axis_iter(Axis(0))
        .zip(labels)
        .map(|(p, &l)| squared_distance(p, centers.row(l)))
        .sum()
}

/// Number of distinct labels present.
pub fn distinct_labels(labels: &[ClusterLabel]) -> usize {
    let mut seen: Vec<ClusterLabel> = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Mean silhouette coefficient over all points.
///
/// For point i: a = mean distance to the rest of its own cluster,
/// b = lowest mean distance to any other non-empty cluster,
/// s = (b − a) / max(a, b). Points alone in their cluster score 0.
/// Fewer than two non-empty clusters score 0.
pub fn silhouette_score(points: &Array2<f64>, labels: &[ClusterLabel]) -> f64 {
    let n = points.nrows().min(labels.len());
    if n < 2 || distinct_labels(&labels[..n]) < 2 {
        return 0.0;
    }

    let n_buckets = labels[..n].iter().max().map_or(0, |m| m + 1);
    let mut sizes = vec![0usize; n_buckets];
    for &l in &labels[..n] {
        sizes[l] += 1;
    }

    let mut total = 0.0;
    let mut distance_sums = vec![0.0; n_buckets];
    for i in 0..n {
        let own = labels[i];
        if sizes[own] < 2 {
            continue;
        }
        distance_sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                distance_sums[labels[j]] += euclidean_distance(points.row(i), points.row(j));
            }
        }

        let a = distance_sums[own] / (sizes[own] - 1) as f64;
        let b = (0..n_buckets)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| distance_sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 && b.is_finite() {
            total += (b - a) / denom;
        }
    }

    (total / n as f64).clamp(-1.0, 1.0)
}
