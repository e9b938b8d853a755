//! Feature Preparer: cleans one cohort into a numeric feature table.
//!
//! Steps, in order:
//!   1. Rating → ordinal score via the fixed scale (unmapped = missing).
//!   2. Coverage, delinquency, contract value, balance → f64 (bad text = missing).
//!   3. Drop rows missing score, coverage or delinquency. These are never imputed.
//!   4. Impute contract value / balance with this cohort's median (two passes).
//!   5. Impute modality with UNKNOWN, upper-case, one-hot encode.
//!
//! Cohorts below the raw or cleaned row minimum are skipped, not failed.

use crate::{
    config::EngineConfig,
    contract::{coerce, ContractRecord, RiskRating},
    error::SegResult,
    types::{ClientId, ProfileTag},
};
use ndarray::Array2;
use std::collections::BTreeSet;
use std::fmt;

/// The five raw numeric drivers, in feature-column order.
pub const DRIVER_COLUMNS: [&str; 5] = [
    "risk_score",
    "coverage",
    "delinquency",
    "contract_value",
    "balance",
];

pub const UNKNOWN_MODALITY: &str = "UNKNOWN";
pub const MODALITY_PREFIX: &str = "modality_";

/// One retained contract, cleaned.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub client_id:      ClientId,
    pub client_name:    Option<String>,
    pub profile:        ProfileTag,
    pub branch:         Option<String>,
    pub portfolio:      Option<String>,
    pub product_line:   Option<String>,
    pub risk_rating:    RiskRating,
    pub coverage:       f64,
    pub delinquency:    f64,
    pub contract_value: f64,
    pub balance:        f64,
    /// Upper-cased modality code, UNKNOWN when absent.
    pub modality:       String,
}

impl FeatureRow {
    pub fn risk_score(&self) -> f64 {
        self.risk_rating.score() as f64
    }

    /// Raw driver values in DRIVER_COLUMNS order.
    pub fn drivers(&self) -> [f64; 5] {
        [
            self.risk_score(),
            self.coverage,
            self.delinquency,
            self.contract_value,
            self.balance,
        ]
    }
}

/// A cleaned cohort plus its one-hot vocabulary.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    /// Distinct modality codes, ascending. One indicator column each.
    pub modalities: Vec<String>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names handed downstream: the drivers, then one indicator per
    /// modality. The raw modality code itself is never a feature column.
    pub fn feature_columns(&self) -> Vec<String> {
        DRIVER_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.modalities.iter().map(|m| format!("{MODALITY_PREFIX}{m}")))
            .collect()
    }

    /// n_rows × n_features numeric matrix in feature_columns() order.
    pub fn matrix(&self) -> SegResult<Array2<f64>> {
        let n_features = DRIVER_COLUMNS.len() + self.modalities.len();
        let mut values = Vec::with_capacity(self.rows.len() * n_features);
        for row in &self.rows {
            values.extend_from_slice(&row.drivers());
            values.extend(
                self.modalities
                    .iter()
                    .map(|m| if *m == row.modality { 1.0 } else { 0.0 }),
            );
        }
        Ok(Array2::from_shape_vec((self.rows.len(), n_features), values)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooFewRecords   { count: usize, minimum: usize },
    TooFewCleanRows { count: usize, minimum: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewRecords { count, minimum } => {
                write!(f, "only {count} records (minimum {minimum})")
            }
            SkipReason::TooFewCleanRows { count, minimum } => {
                write!(f, "only {count} rows left after cleaning (minimum {minimum})")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Preparation {
    Ready(FeatureTable),
    Skipped(SkipReason),
}

/// Row that survived the missing-value filter; the two imputable
/// columns may still be empty.
struct PartialRow<'a> {
    source:         &'a ContractRecord,
    risk_rating:    RiskRating,
    coverage:       f64,
    delinquency:    f64,
    contract_value: Option<f64>,
    balance:        Option<f64>,
}

/// Clean and encode one cohort.
pub fn prepare_cohort(contracts: &[ContractRecord], config: &EngineConfig) -> Preparation {
    if contracts.len() < config.min_raw_records {
        return Preparation::Skipped(SkipReason::TooFewRecords {
            count:   contracts.len(),
            minimum: config.min_raw_records,
        });
    }

    let survivors: Vec<PartialRow<'_>> = contracts
        .iter()
        .filter_map(|c| {
            let risk_rating = c.risk_rating.as_deref().and_then(RiskRating::parse)?;
            let coverage = coerce(&c.coverage)?;
            let delinquency = coerce(&c.delinquency)?;
            Some(PartialRow {
                source: c,
                risk_rating,
                coverage,
                delinquency,
                contract_value: coerce(&c.contract_value),
                balance: coerce(&c.balance),
            })
        })
        .collect();

    if survivors.len() < config.min_clean_rows {
        return Preparation::Skipped(SkipReason::TooFewCleanRows {
            count:   survivors.len(),
            minimum: config.min_clean_rows,
        });
    }

    // Pass one: cohort-local medians over the surviving rows.
    let value_fill = fill_value(
        "contract_value",
        survivors.iter().filter_map(|r| r.contract_value).collect(),
    );
    let balance_fill = fill_value(
        "balance",
        survivors.iter().filter_map(|r| r.balance).collect(),
    );

    // Pass two: fill and encode.
    let rows: Vec<FeatureRow> = survivors
        .into_iter()
        .map(|r| FeatureRow {
            client_id:      r.source.client_id.clone(),
            client_name:    r.source.client_name.clone(),
            profile:        r.source.profile.clone(),
            branch:         r.source.branch.clone(),
            portfolio:      r.source.portfolio.clone(),
            product_line:   r.source.product_line.clone(),
            risk_rating:    r.risk_rating,
            coverage:       r.coverage,
            delinquency:    r.delinquency,
            contract_value: r.contract_value.unwrap_or(value_fill),
            balance:        r.balance.unwrap_or(balance_fill),
            modality:       normalize_modality(r.source.modality.as_deref()),
        })
        .collect();

    let modalities: BTreeSet<String> = rows.iter().map(|r| r.modality.clone()).collect();

    Preparation::Ready(FeatureTable {
        rows,
        modalities: modalities.into_iter().collect(),
    })
}

fn normalize_modality(raw: Option<&str>) -> String {
    match raw {
        Some(code) => code.to_uppercase(),
        None => UNKNOWN_MODALITY.to_string(),
    }
}

fn fill_value(column: &str, present: Vec<f64>) -> f64 {
    match median(present) {
        Some(m) => m,
        None => {
            log::warn!("{column}: no value present in cohort, imputing 0.0");
            0.0
        }
    }
}

/// Median of the given values; the mean of the two middle values for
/// even counts. None for an empty input.
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort(n: usize) -> Vec<ContractRecord> {
        (0..n)
            .map(|i| ContractRecord::numeric(format!("c{i}"), "PF", "B", 50.0, 1.0, 1000.0, 400.0))
            .collect()
    }

    fn ready(contracts: &[ContractRecord]) -> FeatureTable {
        match prepare_cohort(contracts, &EngineConfig::default()) {
            Preparation::Ready(table) => table,
            Preparation::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn median_handles_odd_even_and_empty() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(Vec::new()), None);
    }

    #[test]
    fn small_cohort_is_skipped_before_cleaning() {
        match prepare_cohort(&cohort(24), &EngineConfig::default()) {
            Preparation::Skipped(SkipReason::TooFewRecords { count, minimum }) => {
                assert_eq!((count, minimum), (24, 25));
            }
            other => panic!("expected TooFewRecords, got {other:?}"),
        }
    }

    #[test]
    fn rows_missing_required_drivers_are_dropped() {
        let mut contracts = cohort(30);
        contracts[0].risk_rating = Some("ZZ".into());
        contracts[1].coverage = Some("n/a".into());
        contracts[2].delinquency = None;
        contracts[3].coverage = Some(" 12.5 ".into());
        let table = ready(&contracts);
        assert_eq!(table.len(), 27);
        assert_eq!(table.rows[0].client_id, "c3");
        assert_eq!(table.rows[0].coverage, 12.5);
    }

    #[test]
    fn too_few_clean_rows_skips() {
        let mut contracts = cohort(30);
        for c in contracts.iter_mut().skip(4) {
            c.risk_rating = None;
        }
        match prepare_cohort(&contracts, &EngineConfig::default()) {
            Preparation::Skipped(SkipReason::TooFewCleanRows { count, minimum }) => {
                assert_eq!((count, minimum), (4, 5));
            }
            other => panic!("expected TooFewCleanRows, got {other:?}"),
        }
    }

    #[test]
    fn value_and_balance_are_imputed_with_the_cohort_median() {
        let mut contracts = cohort(30);
        for (i, c) in contracts.iter_mut().enumerate() {
            c.contract_value = Some((i as f64).into());
        }
        contracts[0].contract_value = None;
        contracts[1].balance = Some("garbage".into());
        let table = ready(&contracts);
        // Present values are 1..=29, median 15.
        assert_eq!(table.rows[0].contract_value, 15.0);
        assert_eq!(table.rows[1].balance, 400.0);
    }

    #[test]
    fn modality_is_upper_cased_and_one_hot_encoded() {
        let mut contracts = cohort(30);
        contracts[0].modality = Some("rural".into());
        contracts[1].modality = Some("RURAL".into());
        contracts[2].modality = Some("Export".into());
        let table = ready(&contracts);
        assert_eq!(table.modalities, vec!["EXPORT", "RURAL", "UNKNOWN"]);
        assert_eq!(
            table.feature_columns(),
            vec![
                "risk_score",
                "coverage",
                "delinquency",
                "contract_value",
                "balance",
                "modality_EXPORT",
                "modality_RURAL",
                "modality_UNKNOWN",
            ]
        );

        let m = table.matrix().unwrap();
        assert_eq!(m.dim(), (30, 8));
        assert_eq!(m.row(0).to_vec(), vec![2.0, 50.0, 1.0, 1000.0, 400.0, 0.0, 1.0, 0.0]);
        assert_eq!(m.row(2)[5], 1.0);
        assert_eq!(m.row(3)[7], 1.0);
    }
}
