//! Factor Extractor: z-scores the feature table and fits a maximum-likelihood
//! factor analysis model by EM.
//!
//! Model: x = W z + ε, z ~ N(0, I_m), ε ~ N(0, Ψ) with Ψ diagonal.
//! Every m × m system goes through the Woodbury form, so no p × p matrix
//! is ever inverted.

use crate::{
    config::FactorConfig,
    error::{SegError, SegResult},
    linalg::{invert, log_det_spd},
    rng::StageRng,
};
use ndarray::{Array1, Array2, Axis};

/// Z-scored feature matrix plus the parameters used to produce it.
#[derive(Debug, Clone)]
pub struct Standardized {
    pub values: Array2<f64>,
    pub means:  Array1<f64>,
    /// Population standard deviation per column; 0.0 marks a constant column.
    pub scales: Array1<f64>,
}

/// Column-wise z-score. Constant columns become all zeros.
pub fn standardize(x: &Array2<f64>) -> Standardized {
    let n = x.nrows().max(1) as f64;
    let mut values = x.clone();
    let mut means = Array1::<f64>::zeros(x.ncols());
    let mut scales = Array1::<f64>::zeros(x.ncols());

    for (j, mut column) in values.axis_iter_mut(Axis(1)).enumerate() {
        let mean = column.sum() / n;
        let first = column.iter().next().copied().unwrap_or(0.0);
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        means[j] = mean;

        let constant = column.iter().all(|v| *v == first)
            || std <= f64::EPSILON * (1.0 + mean.abs());
        if constant {
            column.fill(0.0);
        } else {
            scales[j] = std;
            column.mapv_inplace(|v| (v - mean) / std);
        }
    }

    Standardized { values, means, scales }
}

/// Number of latent components for an n × p table:
/// min(policy cap, max(1, min(ceiling, p, n − 1))).
pub fn choose_components(n_samples: usize, n_features: usize, config: &FactorConfig) -> usize {
    let available = config
        .component_ceiling
        .min(n_features)
        .min(n_samples.saturating_sub(1))
        .max(1);
    config.max_components.min(available)
}

/// Persisted factor names, `factor_1` … `factor_m`.
pub fn factor_names(n_components: usize) -> Vec<String> {
    (1..=n_components).map(|i| format!("factor_{i}")).collect()
}

/// Fitted factor model parameters.
#[derive(Debug, Clone)]
pub struct FactorModel {
    /// m × p. Row i is factor i's weight on each standardized feature.
    pub loadings:       Array2<f64>,
    /// Ψ, one unique variance per feature.
    pub noise_variance: Array1<f64>,
    /// Average per-sample log-likelihood, up to the 2π constant.
    pub log_likelihood: f64,
    pub iterations:     usize,
    pub converged:      bool,
}

#[derive(Debug, Clone)]
pub struct FactorExtraction {
    pub n_components: usize,
    /// n × m posterior mean of z for every record.
    pub scores:       Array2<f64>,
    pub model:        FactorModel,
    pub standardized: Standardized,
}

/// Standardize `x`, pick the component count and fit the factor model.
pub fn extract_factors(
    x: &Array2<f64>,
    config: &FactorConfig,
    rng: &mut StageRng,
) -> SegResult<FactorExtraction> {
    let standardized = standardize(x);
    let n_components = choose_components(x.nrows(), x.ncols(), config);
    let (model, scores) = fit_factor_model(&standardized.values, n_components, config, rng)?;
    Ok(FactorExtraction {
        n_components,
        scores,
        model,
        standardized,
    })
}

/// EM for maximum-likelihood factor analysis on already-centred data.
/// Returns the model and the n × m factor scores.
pub fn fit_factor_model(
    z: &Array2<f64>,
    n_components: usize,
    config: &FactorConfig,
    rng: &mut StageRng,
) -> SegResult<(FactorModel, Array2<f64>)> {
    let n = z.nrows().max(1) as f64;
    let p = z.ncols();
    let m = n_components;
    let floor = config.noise_floor;

    let cov = z.t().dot(z) / n;
    let mut psi: Array1<f64> = cov.diag().mapv(|v| v.max(floor));
    let mut w = Array2::<f64>::from_shape_fn((p, m), |_| rng.symmetric(0.1));

    let mut previous = f64::NEG_INFINITY;
    let mut log_likelihood = previous;
    let mut iterations = 0;
    let mut converged = false;

    for iteration in 1..=config.max_iterations {
        iterations = iteration;
        let posterior = Posterior::new(&w, &psi)?;

        // E-step moments, averaged over samples.
        let s_beta_t = cov.dot(&posterior.beta.t());
        let ezz = &posterior.a_inv + &posterior.beta.dot(&s_beta_t);

        // M-step.
        w = s_beta_t.dot(&invert(&ezz)?);
        for j in 0..p {
            let explained: f64 = (0..m).map(|k| w[[j, k]] * s_beta_t[[j, k]]).sum();
            psi[j] = (cov[[j, j]] - explained).max(floor);
        }

        log_likelihood = average_log_likelihood(&cov, &w, &psi)?;
        if !log_likelihood.is_finite() {
            return Err(SegError::NonFiniteLikelihood { iteration });
        }
        if (log_likelihood - previous).abs() < config.tolerance {
            converged = true;
            break;
        }
        previous = log_likelihood;
    }

    if converged {
        log::debug!(
            "{}: m={m} converged after {iterations} iterations, ll={log_likelihood:.6}",
            rng.name
        );
    } else {
        log::warn!(
            "{}: m={m} stopped at iteration cap {iterations}, ll={log_likelihood:.6}",
            rng.name
        );
    }

    let posterior = Posterior::new(&w, &psi)?;
    let scores = z.dot(&posterior.beta.t());

    let model = FactorModel {
        loadings: w.t().to_owned(),
        noise_variance: psi,
        log_likelihood,
        iterations,
        converged,
    };
    Ok((model, scores))
}

/// Posterior operator for the current parameters.
struct Posterior {
    /// (I + Wᵀ Ψ⁻¹ W)⁻¹, also the posterior covariance of z.
    a_inv: Array2<f64>,
    /// m × p map from x to E[z | x].
    beta:  Array2<f64>,
}

impl Posterior {
    fn new(w: &Array2<f64>, psi: &Array1<f64>) -> SegResult<Self> {
        let psi_inv_w = scale_rows(w, psi);
        let a = Array2::<f64>::eye(w.ncols()) + w.t().dot(&psi_inv_w);
        let a_inv = invert(&a)?;
        let beta = a_inv.dot(&psi_inv_w.t());
        Ok(Self { a_inv, beta })
    }
}

/// Ψ⁻¹ W: row j of W divided by ψ_j.
fn scale_rows(w: &Array2<f64>, psi: &Array1<f64>) -> Array2<f64> {
    let mut scaled = w.clone();
    for (mut row, &v) in scaled.axis_iter_mut(Axis(0)).zip(psi.iter()) {
        row.mapv_inplace(|x| x / v);
    }
    scaled
}

/// −½ (ln|Σ| + tr(Σ⁻¹ S)) with Σ = W Wᵀ + Ψ, via the determinant lemma
/// and Woodbury identity.
fn average_log_likelihood(cov: &Array2<f64>, w: &Array2<f64>, psi: &Array1<f64>) -> SegResult<f64> {
    let psi_inv_w = scale_rows(w, psi);
    let a = Array2::<f64>::eye(w.ncols()) + w.t().dot(&psi_inv_w);
    let log_det = psi.iter().map(|v| v.ln()).sum::<f64>() + log_det_spd(&a)?;

    let trace_psi = cov
        .diag()
        .iter()
        .zip(psi.iter())
        .map(|(s, v)| s / v)
        .sum::<f64>();
    let inner = psi_inv_w.t().dot(cov).dot(&psi_inv_w);
    let correction = invert(&a)?.dot(&inner).diag().sum();

    Ok(-0.5 * (log_det + trace_psi - correction))
}
