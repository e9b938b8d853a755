//! seg-runner: batch segmentation runner.
//!
//! Usage:
//!   seg-runner --db portfolio.db
//!   seg-runner --db portfolio.db --config engine.json --seed 7 --output-dir ./out
//!   seg-runner --db portfolio.db --list-runs [--json]

use anyhow::{Context, Result};
use segmentation_core::{
    config::EngineConfig,
    engine::{BatchReport, CohortReport, SegmentationEngine},
    store::SegStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = required_arg(&args, "--db")?;
    let config_path = string_arg(&args, "--config");
    let list_runs = args.iter().any(|a| a == "--list-runs");
    let as_json = args.iter().any(|a| a == "--json");

    let store = SegStore::open(db).with_context(|| format!("opening {db}"))?;
    store.migrate()?;

    if list_runs {
        return print_runs(&store, as_json);
    }

    let mut config = match config_path {
        Some(path) => {
            log::info!("loading engine config from {path}");
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(seed) = parse_arg::<u64>(&args, "--seed")? {
        config.seed = seed;
    }
    if let Some(dir) = string_arg(&args, "--output-dir") {
        config.output_dir = Some(dir.to_string());
    }

    println!("seg-runner");
    println!("  db:          {db}");
    println!("  seed:        {}", config.seed);
    println!("  output_dir:  {}", config.output_dir.as_deref().unwrap_or("(none)"));
    println!("  contracts:   {}", store.contract_count()?);
    println!();

    let engine = SegmentationEngine::new(config, &store);
    let report = engine.run_all()?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &BatchReport) {
    println!("=== SEGMENTATION SUMMARY ===");
    for cohort in &report.cohorts {
        match cohort {
            CohortReport::Recorded { profile, run_id, clients, n_clusters, silhouette } => {
                println!(
                    "  {profile:<24} k={n_clusters} rows={clients:<6} silhouette={silhouette:.4} run={run_id}"
                );
            }
            CohortReport::Skipped { profile, reason } => {
                println!("  {profile:<24} skipped: {reason}");
            }
        }
    }
    println!();
    println!("  recorded: {}", report.recorded());
    println!("  skipped:  {}", report.skipped());
    for path in &report.files_written {
        println!("  wrote {}", path.display());
    }
}

#[derive(serde::Serialize)]
struct RunListing {
    run_id:     String,
    profile:    String,
    n_clusters: usize,
    silhouette: f64,
    run_at:     String,
}

fn print_runs(store: &SegStore, as_json: bool) -> Result<()> {
    let listings: Vec<RunListing> = store
        .list_runs()?
        .into_iter()
        .map(|h| RunListing {
            run_at:     h.run_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            n_clusters: h.parameters.n_clusters,
            silhouette: h.metrics.silhouette,
            run_id:     h.run_id,
            profile:    h.profile,
        })
        .collect();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        println!("  (no runs recorded)");
        return Ok(());
    }
    for r in &listings {
        println!(
            "  {}  {:<24} k={} silhouette={:.4}  {}",
            r.run_at, r.profile, r.n_clusters, r.silhouette, r.run_id
        );
    }
    println!();
    for c in store.client_count_per_run()? {
        println!("  {:<24} {}  {} rows", c.profile, c.run_id, c.rows);
    }
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn required_arg<'a>(args: &'a [String], flag: &str) -> Result<&'a str> {
    string_arg(args, flag).with_context(|| format!("{flag} <path> is required"))
}

/// None when the flag is absent; an error when its value does not parse.
fn parse_arg<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    string_arg(args, flag)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid value for {flag}: {raw:?}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn db_flag_is_required() {
        let err = required_arg(&args("seg-runner --seed 7"), "--db").unwrap_err();
        assert!(err.to_string().contains("--db"));
        assert_eq!(required_arg(&args("seg-runner --db a.db"), "--db").unwrap(), "a.db");
    }

    #[test]
    fn flag_without_value_counts_as_missing() {
        assert!(required_arg(&args("seg-runner --db"), "--db").is_err());
    }

    #[test]
    fn seed_is_parsed_when_present() {
        let parsed = parse_arg::<u64>(&args("seg-runner --db a.db --seed 7"), "--seed").unwrap();
        assert_eq!(parsed, Some(7));
        let absent = parse_arg::<u64>(&args("seg-runner --db a.db"), "--seed").unwrap();
        assert_eq!(absent, None);
    }

    #[test]
    fn unparseable_seed_is_an_error() {
        let err = parse_arg::<u64>(&args("seg-runner --db a.db --seed 7x"), "--seed").unwrap_err();
        assert!(err.to_string().contains("--seed"), "{err}");
        assert!(parse_arg::<u64>(&args("seg-runner --seed -1"), "--seed").is_err());
    }
}
