//! Partitioner: the persisted clustering at the selected k.

use crate::{
    config::ClusterConfig,
    error::SegResult,
    kmeans::{fit_kmeans, silhouette_score},
    rng::StageRng,
    types::ClusterLabel,
};
use ndarray::{Array2, Axis};

#[derive(Debug, Clone)]
pub struct Partition {
    pub k:          usize,
    pub labels:     Vec<ClusterLabel>,
    /// k × m centers in factor space.
    pub centers:    Array2<f64>,
    /// 0 when k = 1 or fewer than two clusters survive.
    pub silhouette: f64,
}

impl Partition {
    /// Every record in one cluster centred on the mean factor vector.
    fn unsplit(factors: &Array2<f64>) -> Self {
        let center = factors
            .mean_axis(Axis(0))
            .unwrap_or_else(|| ndarray::Array1::zeros(factors.ncols()));
        Self {
            k:          1,
            labels:     vec![0; factors.nrows()],
            centers:    center.insert_axis(Axis(0)),
            silhouette: 0.0,
        }
    }
}

/// Fit the final model with `final_restarts` restarts.
pub fn partition(
    factors: &Array2<f64>,
    k: usize,
    config: &ClusterConfig,
    rng: &StageRng,
) -> SegResult<Partition> {
    if k <= 1 {
        return Ok(Partition::unsplit(factors));
    }

    let fit = fit_kmeans(
        factors,
        k,
        config.final_restarts,
        config.max_iterations,
        config.tolerance,
        rng,
    )?;

    let silhouette = if fit.non_empty_clusters() >= 2 {
        silhouette_score(factors, &fit.labels)
    } else {
        0.0
    };

    log::debug!(
        "{}: k={k} inertia={:.4} silhouette={silhouette:.4}",
        rng.name,
        fit.inertia
    );
    Ok(Partition {
        k,
        labels: fit.labels,
        centers: fit.centers,
        silhouette,
    })
}
