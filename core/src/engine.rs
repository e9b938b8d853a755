//! The batch driver. Loads contracts, groups them into cohorts and runs each
//! one through the pipeline.
//!
//! EXECUTION ORDER (per invocation):
//!   1. Load every contract with a profile tag from the store
//!   2. Group by profile, ascending
//!   3. Per cohort: segment, record the run, write the cohort files
//!   4. Write the cross-cohort rollups over every segmented cohort
//!
//! RULES:
//!   - A cohort is persisted in full or not at all.
//!   - A skipped cohort produces no run, no files and no rollup rows.
//!   - A failing cohort aborts the invocation; runs already recorded stay.

use crate::{
    config::EngineConfig,
    contract::ContractRecord,
    error::SegResult,
    export::{detail_records, write_cohort_files, write_rollups, DetailRecord},
    features::SkipReason,
    pipeline::{segment_cohort, CohortOutcome},
    run::RunRecord,
    store::SegStore,
    types::{ProfileTag, RunId},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What happened to one cohort.
#[derive(Debug, Clone, PartialEq)]
pub enum CohortReport {
    Skipped {
        profile: ProfileTag,
        reason:  SkipReason,
    },
    Recorded {
        profile:    ProfileTag,
        run_id:     RunId,
        clients:    usize,
        n_clusters: usize,
        silhouette: f64,
    },
}

impl CohortReport {
    pub fn profile(&self) -> &str {
        match self {
            CohortReport::Skipped { profile, .. } | CohortReport::Recorded { profile, .. } => {
                profile.as_str()
            }
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            CohortReport::Recorded { run_id, .. } => Some(run_id.as_str()),
            CohortReport::Skipped { .. } => None,
        }
    }
}

/// Result of one full invocation.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub cohorts:       Vec<CohortReport>,
    pub files_written: Vec<PathBuf>,
}

impl BatchReport {
    pub fn recorded(&self) -> usize {
        self.cohorts.iter().filter(|c| c.run_id().is_some()).count()
    }

    pub fn skipped(&self) -> usize {
        self.cohorts.len() - self.recorded()
    }
}

pub struct SegmentationEngine<'a> {
    pub config: EngineConfig,
    store:      &'a SegStore,
}

impl<'a> SegmentationEngine<'a> {
    pub fn new(config: EngineConfig, store: &'a SegStore) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &SegStore {
        self.store
    }

    /// Segment every cohort in the store.
    pub fn run_all(&self) -> SegResult<BatchReport> {
        let contracts = self.store.load_contracts()?;
        let cohorts = group_by_profile(contracts);
        log::info!("{} cohorts to segment", cohorts.len());

        let mut report = BatchReport::default();
        let mut details: Vec<DetailRecord> = Vec::new();

        for (profile, contracts) in &cohorts {
            let (cohort, files, rows) = self.process(profile, contracts)?;
            report.cohorts.push(cohort);
            report.files_written.extend(files);
            details.extend(rows);
        }

        if let Some(dir) = self.output_dir() {
            if details.is_empty() {
                log::warn!("no cohort was segmented, rollups not written to {}", dir.display());
            } else {
                report.files_written.extend(write_rollups(&dir, &details)?);
            }
        }

        log::info!(
            "batch done: {} recorded, {} skipped",
            report.recorded(),
            report.skipped()
        );
        Ok(report)
    }

    /// Segment and record a single cohort. Rollups are not written.
    pub fn run_cohort(&self, profile: &str, contracts: &[ContractRecord]) -> SegResult<CohortReport> {
        let (cohort, _, _) = self.process(profile, contracts)?;
        Ok(cohort)
    }

    fn process(
        &self,
        profile: &str,
        contracts: &[ContractRecord],
    ) -> SegResult<(CohortReport, Vec<PathBuf>, Vec<DetailRecord>)> {
        let segmentation = match segment_cohort(profile, contracts, &self.config)? {
            CohortOutcome::Segmented(s) => s,
            CohortOutcome::Skipped { profile, reason } => {
                return Ok((CohortReport::Skipped { profile, reason }, Vec::new(), Vec::new()));
            }
        };

        let run = RunRecord::from_segmentation(&segmentation, self.config.seed);
        self.store.record_run(&run)?;
        log::info!(
            "profile {profile}: run {} recorded, k={}, silhouette={:.4}",
            run.run_id(),
            segmentation.partition.k,
            segmentation.partition.silhouette
        );

        let mut files = Vec::new();
        if let Some(dir) = self.output_dir() {
            let written = write_cohort_files(&dir, &segmentation)?;
            files.push(written.detail);
            files.push(written.summary);
        }

        let cohort = CohortReport::Recorded {
            profile:    profile.to_string(),
            run_id:     run.header.run_id.clone(),
            clients:    run.clients.len(),
            n_clusters: segmentation.partition.k,
            silhouette: segmentation.partition.silhouette,
        };
        Ok((cohort, files, detail_records(&segmentation)))
    }

    fn output_dir(&self) -> Option<PathBuf> {
        self.config.output_dir.as_deref().map(|d| Path::new(d).to_path_buf())
    }
}

/// Cohorts keyed by profile, ascending. Input order is kept within a cohort.
pub fn group_by_profile(contracts: Vec<ContractRecord>) -> BTreeMap<ProfileTag, Vec<ContractRecord>> {
    let mut cohorts: BTreeMap<ProfileTag, Vec<ContractRecord>> = BTreeMap::new();
    for c in contracts {
        cohorts.entry(c.profile.clone()).or_default().push(c);
    }
    cohorts
}
