//! Cluster Selector: picks the cluster count by silhouette.
//!
//! Candidates are k = 2..=min(max_clusters, n − 1). A candidate whose fit
//! collapses to fewer than two non-empty clusters is skipped. The running
//! best starts at (k = 1, score = 0) and only a strictly greater score
//! replaces it, so the first k to reach a score wins and a cohort whose
//! every split scores ≤ 0 stays unsplit.

use crate::{
    config::ClusterConfig,
    error::SegResult,
    kmeans::{fit_kmeans, silhouette_score},
    rng::StageRng,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Search outcome for one candidate k. `silhouette` is None when the fit
/// was degenerate and the candidate was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub k:          usize,
    pub silhouette: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub k:          usize,
    /// Search-time silhouette of the chosen k; 0 when k = 1.
    pub silhouette: f64,
    pub candidates: Vec<CandidateScore>,
}

impl Selection {
    fn unsplit(candidates: Vec<CandidateScore>) -> Self {
        Self { k: 1, silhouette: 0.0, candidates }
    }
}

/// Largest candidate k for a cohort of `n_samples`.
pub fn max_candidate_k(n_samples: usize, config: &ClusterConfig) -> usize {
    config.max_clusters.min(n_samples.saturating_sub(1))
}

/// Choose k for the factor-score matrix. Candidate k runs on `rng.fork(k)`.
pub fn select_cluster_count(
    factors: &Array2<f64>,
    config: &ClusterConfig,
    rng: &StageRng,
) -> SegResult<Selection> {
    let max_k = max_candidate_k(factors.nrows(), config);
    if max_k < 2 {
        return Ok(Selection::unsplit(Vec::new()));
    }

    let mut best_k = 1;
    let mut best_score = 0.0;
    let mut candidates = Vec::with_capacity(max_k - 1);

    for k in 2..=max_k {
        let fit = fit_kmeans(
            factors,
            k,
            config.search_restarts,
            config.max_iterations,
            config.tolerance,
            &rng.fork(k as u64),
        )?;

        if fit.non_empty_clusters() < 2 {
            log::debug!("{}: k={k} collapsed to one cluster, skipped", rng.name);
            candidates.push(CandidateScore { k, silhouette: None });
            continue;
        }

        let score = silhouette_score(factors, &fit.labels);
        log::debug!("{}: k={k} silhouette={score:.4}", rng.name);
        candidates.push(CandidateScore { k, silhouette: Some(score) });
        if score > best_score {
            best_score = score;
            best_k = k;
        }
    }

    if best_k == 1 {
        return Ok(Selection::unsplit(candidates));
    }
    Ok(Selection { k: best_k, silhouette: best_score, candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StageSlot};

    fn search_rng() -> StageRng {
        RngBank::new(42).for_stage(StageSlot::ClusterSearch)
    }

    #[test]
    fn tiny_cohort_is_not_searched() {
        let factors = Array2::from_shape_fn((2, 1), |(i, _)| i as f64);
        let selection = select_cluster_count(&factors, &ClusterConfig::default(), &search_rng()).unwrap();
        assert_eq!(selection.k, 1);
        assert_eq!(selection.silhouette, 0.0);
        assert!(selection.candidates.is_empty());
    }

    #[test]
    fn candidate_range_is_capped_by_sample_count() {
        let config = ClusterConfig::default();
        assert_eq!(max_candidate_k(100, &config), 6);
        assert_eq!(max_candidate_k(5, &config), 4);
        assert_eq!(max_candidate_k(2, &config), 1);
    }

    #[test]
    fn three_groups_select_three() {
        let factors = Array2::from_shape_fn((45, 2), |(i, j)| {
            let group = (i / 15) as f64 * 10.0;
            let jitter = ((i * 7 + j * 3) % 5) as f64 * 0.05;
            if j == 0 { group + jitter } else { jitter }
        });
        let selection = select_cluster_count(&factors, &ClusterConfig::default(), &search_rng()).unwrap();
        assert_eq!(selection.k, 3);
        assert!(selection.silhouette > 0.9);
        assert_eq!(selection.candidates.len(), 5);
    }

    #[test]
    fn identical_points_stay_unsplit() {
        let factors = Array2::<f64>::zeros((30, 3));
        let selection = select_cluster_count(&factors, &ClusterConfig::default(), &search_rng()).unwrap();
        assert_eq!(selection.k, 1);
        assert_eq!(selection.silhouette, 0.0);
        assert!(selection.candidates.iter().all(|c| c.silhouette.is_none()));
    }
}
