//! Run Recorder: packages one segmented cohort into an immutable run.
//!
//! A run is written as one unit: header, one row per retained record, one
//! row per cluster. See SegStore::record_run for the transaction.

use crate::{
    pipeline::CohortSegmentation,
    summary::ClusterSummaryRow,
    types::{ClientId, ClusterLabel, ProfileTag, RunId, ALGORITHM_TAG},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Sparse factor-score mapping, factor name → score. Component counts vary
/// between cohorts, so this is a map and not a fixed-width vector.
pub type FactorScores = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub feature_columns: Vec<String>,
    pub n_components:    usize,
    pub n_clusters:      usize,
    pub seed:            u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Silhouette of the persisted partition.
    pub silhouette:        f64,
    /// Silhouette the selector saw for the chosen k.
    pub search_silhouette: f64,
}

/// Header row of a persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    pub run_id:     RunId,
    pub profile:    ProfileTag,
    pub algorithm:  String,
    pub parameters: RunParameters,
    pub metrics:    RunMetrics,
    pub run_at:     DateTime<Utc>,
}

/// One retained record's assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientAssignment {
    pub client_id:    ClientId,
    pub profile:      ProfileTag,
    pub branch:       Option<String>,
    pub portfolio:    Option<String>,
    pub product_line: Option<String>,
    pub cluster:      ClusterLabel,
    pub risk_rating:  String,
    pub risk_score:   u8,
    pub factors:      FactorScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub header:  RunHeader,
    pub clients: Vec<ClientAssignment>,
    pub summary: Vec<ClusterSummaryRow>,
}

impl RunRecord {
    /// Build a run with a fresh random (v4) identifier.
    pub fn from_segmentation(segmentation: &CohortSegmentation, seed: u64) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), segmentation, seed)
    }

    pub fn with_id(run_id: RunId, segmentation: &CohortSegmentation, seed: u64) -> Self {
        let factor_names = segmentation.factor_names();
        let clients = segmentation
            .table
            .rows
            .iter()
            .zip(&segmentation.partition.labels)
            .zip(segmentation.factors.scores.rows())
            .map(|((row, &cluster), scores)| ClientAssignment {
                client_id:    row.client_id.clone(),
                profile:      row.profile.clone(),
                branch:       row.branch.clone(),
                portfolio:    row.portfolio.clone(),
                product_line: row.product_line.clone(),
                cluster,
                risk_rating:  row.risk_rating.code().to_string(),
                risk_score:   row.risk_rating.score(),
                factors:      factor_names
                    .iter()
                    .cloned()
                    .zip(scores.iter().copied())
                    .filter(|(_, v)| v.is_finite())
                    .collect(),
            })
            .collect();

        let header = RunHeader {
            run_id,
            profile:    segmentation.profile.clone(),
            algorithm:  ALGORITHM_TAG.to_string(),
            parameters: RunParameters {
                feature_columns: segmentation.table.feature_columns(),
                n_components:    segmentation.factors.n_components,
                n_clusters:      segmentation.partition.k,
                seed,
            },
            metrics: RunMetrics {
                silhouette:        segmentation.partition.silhouette,
                search_silhouette: segmentation.selection.silhouette,
            },
            run_at: Utc::now(),
        };

        Self {
            header,
            clients,
            summary: segmentation.summary.clone(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.header.run_id
    }
}
