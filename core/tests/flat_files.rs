//! Per-cohort and rollup CSV outputs.

use segmentation_core::{
    config::EngineConfig,
    contract::ContractRecord,
    engine::SegmentationEngine,
    store::SegStore,
};
use std::path::Path;

fn store_with(cohorts: &[(&str, usize)]) -> SegStore {
    let store = SegStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    for &(profile, n) in cohorts {
        let contracts: Vec<_> = (0..n)
            .map(|i| {
                let (rating, coverage, value) = if i % 2 == 0 {
                    ("AA", 140.0, 5_000.0)
                } else {
                    ("E", 20.0, 750_000.0)
                };
                ContractRecord {
                    branch:       Some(if i < n / 2 { "CENTRO" } else { "PORTO" }.into()),
                    portfolio:    Some(format!("{profile}-BOOK")),
                    product_line: if i % 5 == 0 { None } else { Some("LEASING".into()) },
                    ..ContractRecord::numeric(
                        format!("{profile}-{i:03}"),
                        profile,
                        rating,
                        coverage,
                        (i % 2) as f64 * 60.0,
                        value,
                        value * 0.4,
                    )
                }
            })
            .collect();
        store.insert_contracts(&contracts).unwrap();
    }
    store
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

#[test]
fn no_files_without_an_output_dir() {
    let store = store_with(&[("Alta Renda", 40)]);
    let report = SegmentationEngine::new(EngineConfig::default(), &store)
        .run_all()
        .unwrap();
    assert_eq!(report.recorded(), 1);
    assert!(report.files_written.is_empty());
}

#[test]
fn cohort_and_rollup_files_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with(&[("Alta Renda - PF", 40), ("Agro", 30), ("tiny", 3)]);
    let config = EngineConfig {
        output_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..EngineConfig::default()
    };

    let report = SegmentationEngine::new(config, &store).run_all().unwrap();
    assert_eq!(report.recorded(), 2);
    assert_eq!(report.files_written.len(), 2 * 2 + 3);

    for name in [
        "profile_alta_renda_pf_clusters.csv",
        "profile_alta_renda_pf_cluster_summary.csv",
        "profile_agro_clusters.csv",
        "profile_agro_cluster_summary.csv",
        "clusters_by_branch.csv",
        "clusters_by_portfolio.csv",
        "clusters_by_product_line.csv",
    ] {
        assert!(dir.path().join(name).exists(), "missing {name}");
    }
    assert!(!dir.path().join("profile_tiny_clusters.csv").exists());

    let (header, rows) = read_csv(&dir.path().join("profile_agro_clusters.csv"));
    assert_eq!(
        header,
        vec![
            "client_id",
            "client_name",
            "profile",
            "branch",
            "portfolio",
            "product_line",
            "cluster",
            "factor_1",
            "factor_2",
            "factor_3",
        ]
    );
    assert_eq!(rows.len(), 30);
    assert_eq!(rows[0][0], "Agro-000");
    assert_eq!(rows[0][5], "", "missing product line is written empty");

    let (header, rows) = read_csv(&dir.path().join("profile_agro_cluster_summary.csv"));
    assert_eq!(
        header,
        vec![
            "cluster",
            "client_count",
            "risk_score_mean",
            "coverage_mean",
            "delinquency_mean",
            "contract_value_mean",
            "balance_mean",
        ]
    );
    let total: usize = rows.iter().map(|r| r[1].parse::<usize>().unwrap()).sum();
    assert_eq!(total, 30);
}

#[test]
fn rollups_count_clients_across_cohorts() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with(&[("Alta Renda - PF", 40), ("Agro", 30)]);
    let config = EngineConfig {
        output_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..EngineConfig::default()
    };
    SegmentationEngine::new(config, &store).run_all().unwrap();

    let (header, rows) = read_csv(&dir.path().join("clusters_by_branch.csv"));
    assert_eq!(header, vec!["branch", "cluster", "client_count"]);
    let total: usize = rows.iter().map(|r| r[2].parse::<usize>().unwrap()).sum();
    assert_eq!(total, 70);
    let counts: Vec<usize> = rows.iter().map(|r| r[2].parse().unwrap()).collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]), "not descending: {counts:?}");

    let (_, rows) = read_csv(&dir.path().join("clusters_by_portfolio.csv"));
    let books: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert!(books.contains(&"Agro-BOOK"));
    assert!(books.contains(&"Alta Renda - PF-BOOK"));

    // Every fifth contract has no product line and is left out.
    let (_, rows) = read_csv(&dir.path().join("clusters_by_product_line.csv"));
    let total: usize = rows.iter().map(|r| r[2].parse::<usize>().unwrap()).sum();
    assert_eq!(total, 70 - 8 - 6);
}

#[test]
fn no_rollups_when_every_cohort_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with(&[("tiny", 3), ("small", 10)]);
    let config = EngineConfig {
        output_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..EngineConfig::default()
    };
    let report = SegmentationEngine::new(config, &store).run_all().unwrap();

    assert_eq!(report.recorded(), 0);
    assert_eq!(report.skipped(), 2);
    assert!(report.files_written.is_empty());
    assert!(!dir.path().join("clusters_by_branch.csv").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
