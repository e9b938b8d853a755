//! Per-cohort segmentation pipeline.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Feature Preparer   (features.rs)
//!   2. Factor Extractor   (factors.rs)   StageSlot::FactorFit
//!   3. Cluster Selector   (selection.rs) StageSlot::ClusterSearch
//!   4. Partitioner        (partition.rs) StageSlot::FinalPartition
//!   5. Summarizer         (summary.rs)
//!
//! RULES:
//!   - Pure computation. Nothing here touches the store or the filesystem.
//!   - Each cohort gets a fresh RngBank from the configured seed, so a
//!     cohort's result never depends on which cohorts ran before it.

use crate::{
    config::EngineConfig,
    contract::ContractRecord,
    error::SegResult,
    factors::{extract_factors, factor_names, FactorExtraction},
    features::{prepare_cohort, FeatureTable, Preparation, SkipReason},
    partition::{partition, Partition},
    rng::{RngBank, StageSlot},
    selection::{select_cluster_count, Selection},
    summary::{summarize, ClusterSummaryRow},
    types::ProfileTag,
};

/// Everything computed for one segmented cohort.
#[derive(Debug, Clone)]
pub struct CohortSegmentation {
    pub profile:   ProfileTag,
    pub table:     FeatureTable,
    pub factors:   FactorExtraction,
    pub selection: Selection,
    pub partition: Partition,
    pub summary:   Vec<ClusterSummaryRow>,
}

impl CohortSegmentation {
    pub fn factor_names(&self) -> Vec<String> {
        factor_names(self.factors.n_components)
    }
}

#[derive(Debug, Clone)]
pub enum CohortOutcome {
    Skipped {
        profile: ProfileTag,
        reason:  SkipReason,
    },
    Segmented(Box<CohortSegmentation>),
}

impl CohortOutcome {
    pub fn profile(&self) -> &str {
        match self {
            CohortOutcome::Skipped { profile, .. } => profile.as_str(),
            CohortOutcome::Segmented(s) => &s.profile,
        }
    }

    pub fn segmentation(&self) -> Option<&CohortSegmentation> {
        match self {
            CohortOutcome::Segmented(s) => Some(s.as_ref()),
            CohortOutcome::Skipped { .. } => None,
        }
    }
}

/// Run stages 1–5 over one cohort.
pub fn segment_cohort(
    profile: &str,
    contracts: &[ContractRecord],
    config: &EngineConfig,
) -> SegResult<CohortOutcome> {
    let table = match prepare_cohort(contracts, config) {
        Preparation::Ready(table) => table,
        Preparation::Skipped(reason) => {
            log::warn!("profile {profile}: skipped, {reason}");
            return Ok(CohortOutcome::Skipped {
                profile: profile.to_string(),
                reason,
            });
        }
    };
    log::debug!(
        "profile {profile}: {} of {} records retained, {} feature columns",
        table.len(),
        contracts.len(),
        table.feature_columns().len()
    );

    let bank = RngBank::new(config.seed);

    let matrix = table.matrix()?;
    let factors = extract_factors(&matrix, &config.factor, &mut bank.for_stage(StageSlot::FactorFit))?;

    let selection = select_cluster_count(
        &factors.scores,
        &config.clustering,
        &bank.for_stage(StageSlot::ClusterSearch),
    )?;
    if selection.k == 1 {
        log::warn!("profile {profile}: no candidate k produced a useful split, keeping one cluster");
    }

    let partition = partition(
        &factors.scores,
        selection.k,
        &config.clustering,
        &bank.for_stage(StageSlot::FinalPartition),
    )?;

    let summary = summarize(&table.rows, &partition.labels);

    Ok(CohortOutcome::Segmented(Box::new(CohortSegmentation {
        profile: profile.to_string(),
        table,
        factors,
        selection,
        partition,
        summary,
    })))
}
