use serde::{Deserialize, Serialize};

/// Engine-wide tunables. Every field has a default, so a config file
/// only needs to name what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Master seed for every fitted model. Part of the audit trail.
    pub seed: u64,
    /// Cohorts with fewer raw records are skipped.
    pub min_raw_records: usize,
    /// Cohorts with fewer rows after cleaning are skipped.
    pub min_clean_rows: usize,
    pub factor: FactorConfig,
    pub clustering: ClusterConfig,
    /// Directory for the per-cohort and rollup CSV files. None disables them.
    pub output_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed:            42,
            min_raw_records: 25,
            min_clean_rows:  5,
            factor:          FactorConfig::default(),
            clustering:      ClusterConfig::default(),
            output_dir:      None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FactorConfig {
    /// Policy cap on latent components, for interpretability.
    pub max_components: usize,
    /// Hard ceiling applied before the policy cap.
    pub component_ceiling: usize,
    pub max_iterations: usize,
    /// Stop when the per-sample log-likelihood gains less than this.
    pub tolerance: f64,
    /// Lower bound on every unique (noise) variance.
    pub noise_floor: f64,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            max_components:    3,
            component_ceiling: 5,
            max_iterations:    1000,
            tolerance:         1e-6,
            noise_floor:       1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Largest k tried by the selector (further capped at n − 1).
    pub max_clusters: usize,
    /// k-means restarts per candidate k during selection.
    pub search_restarts: usize,
    /// k-means restarts for the persisted fit.
    pub final_restarts: usize,
    /// Lloyd iteration cap per restart.
    pub max_iterations: usize,
    /// A restart stops once the inertia improves by less than this.
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_clusters:    6,
            search_restarts: 20,
            final_restarts:  50,
            max_iterations:  300,
            tolerance:       1e-4,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing fields fall back to defaults.
    /// In tests, use EngineConfig::default().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_clean_rows < 2 {
            anyhow::bail!("min_clean_rows must be at least 2, got {}", self.min_clean_rows);
        }
        if self.factor.max_components == 0 || self.factor.component_ceiling == 0 {
            anyhow::bail!("factor component limits must be positive");
        }
        if self.factor.noise_floor <= 0.0 {
            anyhow::bail!("factor.noise_floor must be positive");
        }
        if self.clustering.search_restarts == 0 || self.clustering.final_restarts == 0 {
            anyhow::bail!("clustering restart counts must be positive");
        }
        if self.clustering.max_iterations == 0 {
            anyhow::bail!("clustering.max_iterations must be positive");
        }
        if self.clustering.tolerance <= 0.0 {
            anyhow::bail!("clustering.tolerance must be positive");
        }
        Ok(())
    }
}
