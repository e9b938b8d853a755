//! Summarizer: per-cluster descriptive statistics over the raw drivers.

use crate::{
    features::FeatureRow,
    types::ClusterLabel,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One row per distinct cluster label. Means are rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummaryRow {
    pub cluster:             ClusterLabel,
    /// Distinct client identifiers in the cluster.
    pub client_count:        usize,
    pub risk_score_mean:     f64,
    pub coverage_mean:       f64,
    pub delinquency_mean:    f64,
    pub contract_value_mean: f64,
    pub balance_mean:        f64,
}

/// Round to 2 decimal places, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[derive(Default)]
struct Accumulator<'a> {
    clients: BTreeSet<&'a str>,
    sums:    [f64; 5],
    rows:    usize,
}

/// Summarize `rows` under `labels` (same order, same length).
/// Output is strictly ascending by cluster label.
pub fn summarize(rows: &[FeatureRow], labels: &[ClusterLabel]) -> Vec<ClusterSummaryRow> {
    let mut groups: BTreeMap<ClusterLabel, Accumulator<'_>> = BTreeMap::new();
    for (row, &label) in rows.iter().zip(labels) {
        let acc = groups.entry(label).or_default();
        acc.clients.insert(row.client_id.as_str());
        for (sum, value) in acc.sums.iter_mut().zip(row.drivers()) {
            *sum += value;
        }
        acc.rows += 1;
    }

    groups
        .into_iter()
        .map(|(cluster, acc)| {
            let n = acc.rows as f64;
            let [risk, coverage, delinquency, value, balance] = acc.sums.map(|s| round2(s / n));
            ClusterSummaryRow {
                cluster,
                client_count:        acc.clients.len(),
                risk_score_mean:     risk,
                coverage_mean:       coverage,
                delinquency_mean:    delinquency,
                contract_value_mean: value,
                balance_mean:        balance,
            }
        })
        .collect()
}
