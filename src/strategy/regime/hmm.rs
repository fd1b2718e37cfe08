//! Gaussian Hidden Markov Model (1-D, diagonal covariance)
//!
//! Baum-Welch (EM) fitting with log-space forward-backward and Viterbi
//! decoding. Emissions are univariate normals, one per hidden state.
//!
//! Initialization is deterministic: state means start at the quantile-bucket
//! means of the sorted observations, variances at the sample variance, and the
//! transition matrix is diagonal-dominant. Refitting the same data therefore
//! always yields the same parameters.

use serde::Serialize;
use statrs::distribution::{Continuous, Normal};
use statrs::statistics::Statistics;

use super::RegimeError;

/// Initial self-transition probability
const INITIAL_PERSISTENCE: f64 = 0.8;

/// Fitted HMM parameters, states ordered by ascending mean
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HmmParams {
    pub start_probs: Vec<f64>,
    pub transitions: Vec<Vec<f64>>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
}

impl HmmParams {
    pub fn n_states(&self) -> usize {
        self.means.len()
    }

    fn initial(observations: &[f64], n_states: usize, min_variance: f64) -> Self {
        let mut sorted = observations.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let means = (0..n_states)
            .map(|k| {
                let lo = k * n / n_states;
                let hi = ((k + 1) * n / n_states).max(lo + 1).min(n);
                sorted[lo..hi].iter().mean()
            })
            .collect();

        let variance = observations.iter().population_variance().max(min_variance);

        let off_diagonal = (1.0 - INITIAL_PERSISTENCE) / (n_states - 1) as f64;
        let transitions = (0..n_states)
            .map(|i| {
                (0..n_states)
                    .map(|j| if i == j { INITIAL_PERSISTENCE } else { off_diagonal })
                    .collect()
            })
            .collect();

        Self {
            start_probs: vec![1.0 / n_states as f64; n_states],
            transitions,
            means,
            variances: vec![variance; n_states],
        }
    }

    fn emissions(&self) -> Result<Vec<Normal>, RegimeError> {
        self.means
            .iter()
            .zip(&self.variances)
            .map(|(&mean, &var)| {
                Normal::new(mean, var.sqrt()).map_err(|e| {
                    RegimeError::FitDiverged(format!("invalid emission N({}, {}): {}", mean, var, e))
                })
            })
            .collect()
    }

    /// Log emission density per (time, state)
    fn log_emissions(&self, observations: &[f64]) -> Result<Vec<Vec<f64>>, RegimeError> {
        let emissions = self.emissions()?;
        Ok(observations
            .iter()
            .map(|&x| emissions.iter().map(|d| d.ln_pdf(x)).collect())
            .collect())
    }

    /// Relabel states so means ascend
    fn sorted_by_mean(self) -> Self {
        let mut order: Vec<usize> = (0..self.n_states()).collect();
        order.sort_by(|&a, &b| self.means[a].total_cmp(&self.means[b]));

        Self {
            start_probs: order.iter().map(|&i| self.start_probs[i]).collect(),
            transitions: order
                .iter()
                .map(|&i| order.iter().map(|&j| self.transitions[i][j]).collect())
                .collect(),
            means: order.iter().map(|&i| self.means[i]).collect(),
            variances: order.iter().map(|&i| self.variances[i]).collect(),
        }
    }
}

/// Summary of one Baum-Welch run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitReport {
    pub iterations: usize,
    pub log_likelihood: f64,
    pub converged: bool,
}

/// Fit a `n_states` Gaussian HMM to a 1-D observation sequence
pub fn fit(
    observations: &[f64],
    n_states: usize,
    max_iterations: usize,
    tolerance: f64,
    min_variance: f64,
) -> Result<(HmmParams, FitReport), RegimeError> {
    if n_states < 2 {
        return Err(RegimeError::InvalidConfig(format!(
            "n_states must be >= 2, got {}",
            n_states
        )));
    }
    let required = 2 * n_states;
    if observations.len() < required {
        return Err(RegimeError::InsufficientData {
            required,
            actual: observations.len(),
        });
    }
    if let Some(idx) = observations.iter().position(|v| !v.is_finite()) {
        return Err(RegimeError::NonFinite(idx));
    }

    let mut params = HmmParams::initial(observations, n_states, min_variance);
    let mut prev_ll = f64::NEG_INFINITY;
    let mut report = FitReport {
        iterations: 0,
        log_likelihood: f64::NEG_INFINITY,
        converged: false,
    };

    for iter in 0..max_iterations {
        let stats = expectation(&params, observations)?;
        params = maximization(&params, observations, &stats, min_variance);

        report.iterations = iter + 1;
        report.log_likelihood = stats.log_likelihood;

        if stats.log_likelihood - prev_ll < tolerance {
            report.converged = true;
            break;
        }
        prev_ll = stats.log_likelihood;
    }

    tracing::trace!(
        "HMM fit: {} iterations, log-likelihood {:.4}, converged {}",
        report.iterations,
        report.log_likelihood,
        report.converged
    );

    Ok((params.sorted_by_mean(), report))
}

/// Most likely state path (Viterbi)
pub fn viterbi(params: &HmmParams, observations: &[f64]) -> Result<Vec<usize>, RegimeError> {
    if let Some(idx) = observations.iter().position(|v| !v.is_finite()) {
        return Err(RegimeError::NonFinite(idx));
    }
    let t_len = observations.len();
    if t_len == 0 {
        return Ok(Vec::new());
    }

    let n = params.n_states();
    let log_b = params.log_emissions(observations)?;
    let log_a = log_matrix(&params.transitions);

    let mut delta: Vec<f64> = (0..n)
        .map(|k| params.start_probs[k].ln() + log_b[0][k])
        .collect();
    let mut backpointers: Vec<Vec<usize>> = Vec::with_capacity(t_len);

    for t in 1..t_len {
        let mut next = vec![f64::NEG_INFINITY; n];
        let mut pointers = vec![0; n];
        for j in 0..n {
            for i in 0..n {
                let candidate = delta[i] + log_a[i][j];
                if candidate > next[j] {
                    next[j] = candidate;
                    pointers[j] = i;
                }
            }
            next[j] += log_b[t][j];
        }
        backpointers.push(pointers);
        delta = next;
    }

    let mut state = argmax(&delta);
    let mut path = vec![state; t_len];
    for t in (1..t_len).rev() {
        state = backpointers[t - 1][state];
        path[t - 1] = state;
    }

    Ok(path)
}

struct Expectation {
    /// Posterior state probabilities per time step
    gamma: Vec<Vec<f64>>,
    /// Expected transition counts
    xi_sum: Vec<Vec<f64>>,
    log_likelihood: f64,
}

fn expectation(params: &HmmParams, observations: &[f64]) -> Result<Expectation, RegimeError> {
    let t_len = observations.len();
    let n = params.n_states();
    let log_b = params.log_emissions(observations)?;
    let log_a = log_matrix(&params.transitions);

    let mut alpha = vec![vec![0.0; n]; t_len];
    for k in 0..n {
        alpha[0][k] = params.start_probs[k].ln() + log_b[0][k];
    }
    for t in 1..t_len {
        for j in 0..n {
            let terms: Vec<f64> = (0..n).map(|i| alpha[t - 1][i] + log_a[i][j]).collect();
            alpha[t][j] = log_sum_exp(&terms) + log_b[t][j];
        }
    }

    let mut beta = vec![vec![0.0; n]; t_len];
    for t in (0..t_len - 1).rev() {
        for i in 0..n {
            let terms: Vec<f64> = (0..n)
                .map(|j| log_a[i][j] + log_b[t + 1][j] + beta[t + 1][j])
                .collect();
            beta[t][i] = log_sum_exp(&terms);
        }
    }

    let log_likelihood = log_sum_exp(&alpha[t_len - 1]);
    if !log_likelihood.is_finite() {
        return Err(RegimeError::FitDiverged(format!(
            "log-likelihood is {}",
            log_likelihood
        )));
    }

    let gamma = (0..t_len)
        .map(|t| {
            (0..n)
                .map(|k| (alpha[t][k] + beta[t][k] - log_likelihood).exp())
                .collect()
        })
        .collect();

    let mut xi_sum = vec![vec![0.0; n]; n];
    for t in 0..t_len - 1 {
        for i in 0..n {
            for j in 0..n {
                xi_sum[i][j] += (alpha[t][i] + log_a[i][j] + log_b[t + 1][j] + beta[t + 1][j]
                    - log_likelihood)
                    .exp();
            }
        }
    }

    Ok(Expectation {
        gamma,
        xi_sum,
        log_likelihood,
    })
}

fn maximization(
    params: &HmmParams,
    observations: &[f64],
    stats: &Expectation,
    min_variance: f64,
) -> HmmParams {
    let n = params.n_states();

    let start_probs = normalize(&stats.gamma[0]).unwrap_or_else(|| params.start_probs.clone());

    let transitions = (0..n)
        .map(|i| normalize(&stats.xi_sum[i]).unwrap_or_else(|| params.transitions[i].clone()))
        .collect();

    let mut means = params.means.clone();
    let mut variances = params.variances.clone();
    for k in 0..n {
        let weight: f64 = stats.gamma.iter().map(|g| g[k]).sum();
        if weight < 1e-10 {
            continue;
        }
        let mean = stats
            .gamma
            .iter()
            .zip(observations)
            .map(|(g, x)| g[k] * x)
            .sum::<f64>()
            / weight;
        let variance = stats
            .gamma
            .iter()
            .zip(observations)
            .map(|(g, x)| g[k] * (x - mean).powi(2))
            .sum::<f64>()
            / weight;

        means[k] = mean;
        variances[k] = variance.max(min_variance);
    }

    HmmParams {
        start_probs,
        transitions,
        means,
        variances,
    }
}

fn normalize(row: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = row.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some(row.iter().map(|v| v / total).collect())
}

fn log_matrix(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .map(|row| row.iter().map(|p| p.ln()).collect())
        .collect()
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
