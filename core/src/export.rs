//! Flat-file outputs for inspection: per-cohort detail and summary tables,
//! and cross-cohort rollups by branch, portfolio and product line.
//!
//! File names are derived from the profile slug, so re-running a profile
//! overwrites its files. The store, not these files, is the system of record.

use crate::{
    error::SegResult,
    pipeline::CohortSegmentation,
    summary::ClusterSummaryRow,
    types::{ClientId, ClusterLabel, ProfileTag},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Lower-case, collapse every non-alphanumeric run to one `_`, trim `_`.
/// Falls back to `profile` when nothing is left.
pub fn profile_slug(profile: &str) -> String {
    let mut slug = String::with_capacity(profile.len());
    for ch in profile.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let trimmed = slug.trim_matches('_');
    if trimmed.is_empty() {
        "profile".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn detail_file_name(profile: &str) -> String {
    format!("profile_{}_clusters.csv", profile_slug(profile))
}

pub fn summary_file_name(profile: &str) -> String {
    format!("profile_{}_cluster_summary.csv", profile_slug(profile))
}

/// One retained record in the per-cohort detail table.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub client_id:    ClientId,
    pub client_name:  Option<String>,
    pub profile:      ProfileTag,
    pub branch:       Option<String>,
    pub portfolio:    Option<String>,
    pub product_line: Option<String>,
    pub cluster:      ClusterLabel,
    pub factors:      Vec<f64>,
}

pub fn detail_records(segmentation: &CohortSegmentation) -> Vec<DetailRecord> {
    segmentation
        .table
        .rows
        .iter()
        .zip(&segmentation.partition.labels)
        .zip(segmentation.factors.scores.rows())
        .map(|((row, &cluster), scores)| DetailRecord {
            client_id:    row.client_id.clone(),
            client_name:  row.client_name.clone(),
            profile:      row.profile.clone(),
            branch:       row.branch.clone(),
            portfolio:    row.portfolio.clone(),
            product_line: row.product_line.clone(),
            cluster,
            factors:      scores.to_vec(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CohortFiles {
    pub detail:  PathBuf,
    pub summary: PathBuf,
}

/// Write `profile_<slug>_clusters.csv` and `profile_<slug>_cluster_summary.csv`.
pub fn write_cohort_files(dir: &Path, segmentation: &CohortSegmentation) -> SegResult<CohortFiles> {
    std::fs::create_dir_all(dir)?;
    let detail = dir.join(detail_file_name(&segmentation.profile));
    let summary = dir.join(summary_file_name(&segmentation.profile));

    write_detail(&detail, &detail_records(segmentation), &segmentation.factor_names())?;
    write_summary(&summary, &segmentation.summary)?;

    Ok(CohortFiles { detail, summary })
}

fn write_detail(path: &Path, records: &[DetailRecord], factor_names: &[String]) -> SegResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header: Vec<String> = [
        "client_id",
        "client_name",
        "profile",
        "branch",
        "portfolio",
        "product_line",
        "cluster",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    header.extend(factor_names.iter().cloned());
    writer.write_record(&header)?;

    for r in records {
        let mut fields = vec![
            r.client_id.clone(),
            r.client_name.clone().unwrap_or_default(),
            r.profile.clone(),
            r.branch.clone().unwrap_or_default(),
            r.portfolio.clone().unwrap_or_default(),
            r.product_line.clone().unwrap_or_default(),
            r.cluster.to_string(),
        ];
        fields.extend(r.factors.iter().map(|f| f.to_string()));
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(path: &Path, summary: &[ClusterSummaryRow]) -> SegResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in summary {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

// ── Cross-cohort rollups ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Branch,
    Portfolio,
    ProductLine,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Branch, Dimension::Portfolio, Dimension::ProductLine];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Branch      => "branch",
            Self::Portfolio   => "portfolio",
            Self::ProductLine => "product_line",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Branch      => "clusters_by_branch.csv",
            Self::Portfolio   => "clusters_by_portfolio.csv",
            Self::ProductLine => "clusters_by_product_line.csv",
        }
    }

    fn value<'a>(&self, record: &'a DetailRecord) -> Option<&'a str> {
        match self {
            Self::Branch      => record.branch.as_deref(),
            Self::Portfolio   => record.portfolio.as_deref(),
            Self::ProductLine => record.product_line.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupRow {
    pub value:        String,
    pub cluster:      ClusterLabel,
    pub client_count: usize,
}

/// Distinct clients per (dimension value, cluster), descending by count.
/// Ties order by value, then cluster. Records with no value for the
/// dimension are left out.
pub fn rollup(records: &[DetailRecord], dimension: Dimension) -> Vec<RollupRow> {
    let mut groups: BTreeMap<(&str, ClusterLabel), BTreeSet<&str>> = BTreeMap::new();
    for r in records {
        if let Some(value) = dimension.value(r) {
            groups
                .entry((value, r.cluster))
                .or_default()
                .insert(r.client_id.as_str());
        }
    }

    let mut rows: Vec<RollupRow> = groups
        .into_iter()
        .map(|((value, cluster), clients)| RollupRow {
            value: value.to_string(),
            cluster,
            client_count: clients.len(),
        })
        .collect();
    // BTreeMap order already sorts ties; the sort is stable.
    rows.sort_by(|a, b| b.client_count.cmp(&a.client_count));
    rows
}

/// Write all three rollup files over the consolidated detail records.
pub fn write_rollups(dir: &Path, records: &[DetailRecord]) -> SegResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(Dimension::ALL.len());
    for dimension in Dimension::ALL {
        let path = dir.join(dimension.file_name());
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([dimension.column(), "cluster", "client_count"])?;
        for row in rollup(records, dimension) {
            writer.write_record([
                row.value,
                row.cluster.to_string(),
                row.client_count.to_string(),
            ])?;
        }
        writer.flush()?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(client: &str, branch: Option<&str>, cluster: ClusterLabel) -> DetailRecord {
        DetailRecord {
            client_id:    client.into(),
            client_name:  None,
            profile:      "PF".into(),
            branch:       branch.map(Into::into),
            portfolio:    Some("P1".into()),
            product_line: None,
            cluster,
            factors:      vec![0.5],
        }
    }

    #[test]
    fn slug_collapses_and_trims() {
        assert_eq!(profile_slug("Alta Renda - PF"), "alta_renda_pf");
        assert_eq!(profile_slug("  __Agro!!"), "agro");
        assert_eq!(profile_slug("***"), "profile");
        assert_eq!(profile_slug("ÉLITE 2"), "élite_2");
    }

    #[test]
    fn file_names_use_the_slug() {
        assert_eq!(detail_file_name("Alta Renda PF"), "profile_alta_renda_pf_clusters.csv");
        assert_eq!(
            summary_file_name("Alta Renda PF"),
            "profile_alta_renda_pf_cluster_summary.csv"
        );
    }

    #[test]
    fn rollup_counts_distinct_clients_descending() {
        let records = vec![
            record("a", Some("North"), 0),
            record("a", Some("North"), 0),
            record("b", Some("North"), 0),
            record("c", Some("South"), 1),
            record("d", Some("North"), 1),
            record("e", None, 1),
        ];
        let rows = rollup(&records, Dimension::Branch);
        assert_eq!(
            rows,
            vec![
                RollupRow { value: "North".into(), cluster: 0, client_count: 2 },
                RollupRow { value: "North".into(), cluster: 1, client_count: 1 },
                RollupRow { value: "South".into(), cluster: 1, client_count: 1 },
            ]
        );
    }

    #[test]
    fn rollup_skips_missing_dimension() {
        let records = vec![record("a", Some("North"), 0)];
        assert!(rollup(&records, Dimension::ProductLine).is_empty());
        assert_eq!(rollup(&records, Dimension::Portfolio).len(), 1);
    }
}
