//! Cohort segmentation engine for credit-contract portfolios.
//!
//! Per customer profile: clean and encode the contracts, reduce them to
//! latent factors, pick a cluster count by silhouette, partition, summarize,
//! and record the run atomically in SQLite.

pub mod config;
pub mod contract;
pub mod engine;
pub mod error;
pub mod export;
pub mod factors;
pub mod features;
pub mod kmeans;
pub mod linalg;
pub mod partition;
pub mod pipeline;
pub mod rng;
pub mod run;
pub mod selection;
pub mod store;
pub mod summary;
pub mod types;
