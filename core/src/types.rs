//! Shared primitive types used across the segmentation engine.

/// Client identifier as it appears in the source. Not unique per contract.
pub type ClientId = String;

/// Customer-profile tag. One cohort per distinct value.
pub type ProfileTag = String;

/// The canonical run identifier (hyphenated UUID v4).
pub type RunId = String;

/// Cluster label in `0..k`.
pub type ClusterLabel = usize;

/// Algorithm tag stored on every run header.
pub const ALGORITHM_TAG: &str = "factor_analysis_kmeans_v1";
