//! Unit-Root Hypothesis Tests
//!
//! Two classical tests with opposite null hypotheses:
//! - ADF (Augmented Dickey-Fuller): H0 = unit root (non-stationary)
//! - KPSS (Kwiatkowski-Phillips-Schmidt-Shin): H0 = level stationary
//!
//! A series is declared stationary only when ADF rejects its null and KPSS
//! fails to reject its null, both at the 1% level.

use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;

use super::StationarityError;

/// MacKinnon (2010) response surface for the constant-only ADF 1% critical value:
/// tau + c1/n + c2/n^2 + c3/n^3
const MACKINNON_CONSTANT_1PCT: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];

/// KPSS level-stationarity 1% critical value (Kwiatkowski et al. 1992, table 1)
const KPSS_LEVEL_CRITICAL_1PCT: f64 = 0.739;

/// Fewest observations either test will run on; the smallest ADF regression
/// (one augmentation lag over a common sample) needs nine
const MIN_OBSERVATIONS: usize = 9;

/// ADF test outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient
    pub statistic: f64,
    /// 1% critical value for the regression sample size
    pub critical_value: f64,
    /// Augmentation lags selected by AIC
    pub used_lag: usize,
    /// Observations in the final regression
    pub n_obs: usize,
}

impl AdfResult {
    /// Unit root rejected
    pub fn is_stationary(&self) -> bool {
        self.statistic < self.critical_value
    }
}

/// KPSS test outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpssResult {
    pub statistic: f64,
    pub critical_value: f64,
    /// Bartlett window lags used for the long-run variance
    pub lags: usize,
}

impl KpssResult {
    /// Stationarity not rejected
    pub fn is_stationary(&self) -> bool {
        self.statistic <= self.critical_value
    }
}

/// Anything that can judge whether a series is stationary
pub trait StationarityTest {
    fn is_stationary(&self, series: &[f64]) -> Result<bool, StationarityError>;
}

impl<F> StationarityTest for F
where
    F: Fn(&[f64]) -> Result<bool, StationarityError>,
{
    fn is_stationary(&self, series: &[f64]) -> Result<bool, StationarityError> {
        self(series)
    }
}

/// ADF AND KPSS at the 1% level
#[derive(Debug, Clone, Copy, Default)]
pub struct AdfKpssTest;

impl StationarityTest for AdfKpssTest {
    fn is_stationary(&self, series: &[f64]) -> Result<bool, StationarityError> {
        let adf = adf_test(series)?;
        let kpss = kpss_test(series)?;

        tracing::trace!(
            "ADF stat {:.4} (crit {:.4}, lag {}) | KPSS stat {:.4} (crit {:.3})",
            adf.statistic,
            adf.critical_value,
            adf.used_lag,
            kpss.statistic,
            kpss.critical_value
        );

        Ok(adf.is_stationary() && kpss.is_stationary())
    }
}

/// Combined ADF/KPSS verdict for a series
pub fn is_stationary(series: &[f64]) -> Result<bool, StationarityError> {
    AdfKpssTest.is_stationary(series)
}

/// Augmented Dickey-Fuller test with a constant term.
///
/// Regression: dy_t = a + b*y_{t-1} + sum(g_i * dy_{t-i}) + e_t.
/// The lag order is picked by AIC over a common sample, then the chosen
/// regression is refit on every usable observation.
pub fn adf_test(series: &[f64]) -> Result<AdfResult, StationarityError> {
    check_series(series)?;
    let n = series.len();

    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let max_lag = schwert_lags(n).min((n / 2).saturating_sub(2));
    let common_rows = diffs.len() - max_lag;
    if common_rows <= max_lag + 3 {
        return Err(StationarityError::InsufficientData {
            required: 2 * max_lag + 5,
            actual: n,
        });
    }

    let mut best_lag = 0;
    let mut best_aic = f64::INFINITY;
    for lag in 0..=max_lag {
        let (x, y) = adf_design(series, &diffs, lag, max_lag);
        let fit = ols(&x, &y)?;
        let rows = fit.n_obs as f64;
        let aic = rows * (fit.ssr / rows).ln() + 2.0 * fit.n_params as f64;
        if aic < best_aic {
            best_aic = aic;
            best_lag = lag;
        }
    }

    let (x, y) = adf_design(series, &diffs, best_lag, best_lag);
    let fit = ols(&x, &y)?;
    let dof = fit.n_obs.saturating_sub(fit.n_params);
    if dof == 0 {
        return Err(StationarityError::InsufficientData {
            required: fit.n_params + 1,
            actual: fit.n_obs,
        });
    }

    let mse = fit.ssr / dof as f64;
    let std_err = (mse * fit.xtx_inv[(1, 1)]).sqrt();
    if !std_err.is_finite() || std_err <= 0.0 {
        return Err(StationarityError::DegenerateVariance);
    }

    let statistic = fit.coefficients[1] / std_err;
    let nobs = fit.n_obs as f64;
    let [tau, c1, c2, c3] = MACKINNON_CONSTANT_1PCT;
    let critical_value = tau + c1 / nobs + c2 / nobs.powi(2) + c3 / nobs.powi(3);

    Ok(AdfResult {
        statistic,
        critical_value,
        used_lag: best_lag,
        n_obs: fit.n_obs,
    })
}

/// KPSS test for level stationarity with a Bartlett-kernel long-run variance
pub fn kpss_test(series: &[f64]) -> Result<KpssResult, StationarityError> {
    check_series(series)?;
    let n = series.len();

    let mean = series.iter().mean();
    let residuals: Vec<f64> = series.iter().map(|y| y - mean).collect();

    let lags = schwert_lags(n).min(n - 1);
    let mut long_run = residuals.iter().map(|e| e * e).sum::<f64>();
    for lag in 1..=lags {
        let weight = 1.0 - lag as f64 / (lags + 1) as f64;
        let autocov: f64 = residuals[lag..]
            .iter()
            .zip(&residuals[..n - lag])
            .map(|(a, b)| a * b)
            .sum();
        long_run += 2.0 * weight * autocov;
    }
    long_run /= n as f64;

    if !long_run.is_finite() || long_run <= f64::EPSILON {
        return Err(StationarityError::DegenerateVariance);
    }

    let mut partial = 0.0;
    let mut sum_sq_partial = 0.0;
    for e in &residuals {
        partial += e;
        sum_sq_partial += partial * partial;
    }

    let statistic = sum_sq_partial / ((n * n) as f64 * long_run);

    Ok(KpssResult {
        statistic,
        critical_value: KPSS_LEVEL_CRITICAL_1PCT,
        lags,
    })
}

/// Schwert's rule: ceil(12 * (n/100)^(1/4))
fn schwert_lags(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

fn check_series(series: &[f64]) -> Result<(), StationarityError> {
    if series.len() < MIN_OBSERVATIONS {
        return Err(StationarityError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: series.len(),
        });
    }
    if let Some(idx) = series.iter().position(|v| !v.is_finite()) {
        return Err(StationarityError::NonFinite(idx));
    }
    Ok(())
}

/// Build the ADF design matrix for `lag` augmentation terms, starting at
/// difference index `start` so different lag orders can share a sample.
fn adf_design(series: &[f64], diffs: &[f64], lag: usize, start: usize) -> (DMatrix<f64>, DVector<f64>) {
    let rows = diffs.len() - start;
    let cols = 2 + lag;

    let x = DMatrix::from_fn(rows, cols, |r, c| {
        let j = start + r;
        match c {
            0 => 1.0,
            1 => series[j],
            k => diffs[j - (k - 1)],
        }
    });
    let y = DVector::from_fn(rows, |r, _| diffs[start + r]);

    (x, y)
}

struct OlsFit {
    coefficients: DVector<f64>,
    xtx_inv: DMatrix<f64>,
    ssr: f64,
    n_obs: usize,
    n_params: usize,
}

fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, StationarityError> {
    let xt = x.transpose();
    let xtx_inv = (&xt * x)
        .try_inverse()
        .ok_or(StationarityError::SingularRegression)?;
    let coefficients = &xtx_inv * (&xt * y);
    let residuals = y - x * &coefficients;
    let ssr = residuals.norm_squared();

    if !ssr.is_finite() {
        return Err(StationarityError::SingularRegression);
    }

    Ok(OlsFit {
        coefficients,
        xtx_inv,
        ssr,
        n_obs: x.nrows(),
        n_params: x.ncols(),
    })
}
