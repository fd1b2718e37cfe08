//! Regime Model
//!
//! Wraps the Gaussian HMM behind the train / predict / parameter-extraction
//! contract the orchestrator consumes. Observations are ratios of consecutive
//! closing prices, so regimes describe momentum states rather than price levels.

use serde::{Deserialize, Serialize};

use super::hmm::{self, FitReport, HmmParams};
use super::{RegimeError, RegimeInference, Retrainable};

/// Regime model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeModelConfig {
    /// Number of hidden regimes (K >= 2)
    pub n_regimes: usize,
    /// Baum-Welch iteration budget
    pub max_iterations: usize,
    /// Minimum log-likelihood gain per iteration before stopping
    pub tolerance: f64,
    /// Variance floor for every regime
    pub min_variance: f64,
}

impl Default for RegimeModelConfig {
    fn default() -> Self {
        Self {
            n_regimes: 2,
            max_iterations: 1000,
            tolerance: 1e-2,
            min_variance: 1e-8,
        }
    }
}

impl RegimeModelConfig {
    pub fn with_regimes(mut self, n_regimes: usize) -> Self {
        self.n_regimes = n_regimes;
        self
    }

    pub fn with_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn validate(&self) -> Result<(), RegimeError> {
        if self.n_regimes < 2 {
            return Err(RegimeError::InvalidConfig(format!(
                "n_regimes must be >= 2, got {}",
                self.n_regimes
            )));
        }
        if self.max_iterations == 0 {
            return Err(RegimeError::InvalidConfig(
                "max_iterations must be > 0".to_string(),
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(RegimeError::InvalidConfig(format!(
                "tolerance must be > 0, got {}",
                self.tolerance
            )));
        }
        if !(self.min_variance > 0.0) {
            return Err(RegimeError::InvalidConfig(format!(
                "min_variance must be > 0, got {}",
                self.min_variance
            )));
        }
        Ok(())
    }
}

/// K-regime Gaussian HMM over price ratios
#[derive(Debug, Clone)]
pub struct RegimeModel {
    config: RegimeModelConfig,
    params: Option<HmmParams>,
    last_fit: Option<FitReport>,
}

impl RegimeModel {
    /// Create an untrained model
    pub fn new(config: RegimeModelConfig) -> Result<Self, RegimeError> {
        config.validate()?;
        Ok(Self {
            config,
            params: None,
            last_fit: None,
        })
    }

    /// Fit to a ratio series, replacing any previous parameters. On error the
    /// previous fit is kept.
    pub fn train(&mut self, ratios: &[f64]) -> Result<FitReport, RegimeError> {
        *self = self.retrain(ratios)?;
        self.last_fit.ok_or(RegimeError::NotTrained)
    }

    pub fn is_trained(&self) -> bool {
        self.params.is_some()
    }

    pub fn n_regimes(&self) -> usize {
        self.config.n_regimes
    }

    pub fn config(&self) -> &RegimeModelConfig {
        &self.config
    }

    pub fn params(&self) -> Option<&HmmParams> {
        self.params.as_ref()
    }

    pub fn last_fit(&self) -> Option<&FitReport> {
        self.last_fit.as_ref()
    }

    /// Most likely regime for each observation
    pub fn predict_regime(&self, values: &[f64]) -> Result<Vec<usize>, RegimeError> {
        hmm::viterbi(self.fitted()?, values)
    }

    /// Fitted mean ratio of a regime
    pub fn get_regime_mean(&self, regime: usize) -> Result<f64, RegimeError> {
        let params = self.fitted()?;
        self.check_regime(regime)?;
        Ok(params.means[regime])
    }

    /// Transition row out of a regime (K probabilities summing to 1)
    pub fn get_transition_probabilities(&self, regime: usize) -> Result<&[f64], RegimeError> {
        let params = self.fitted()?;
        self.check_regime(regime)?;
        Ok(&params.transitions[regime])
    }

    /// Decode `observations` and report the regime of the last one
    pub fn infer(&self, observations: &[f64]) -> Result<RegimeInference, RegimeError> {
        let path = self.predict_regime(observations)?;
        let regime = *path.last().ok_or(RegimeError::InsufficientData {
            required: 1,
            actual: 0,
        })?;

        Ok(RegimeInference {
            regime,
            mean: self.get_regime_mean(regime)?,
            transition_row: self.get_transition_probabilities(regime)?.to_vec(),
        })
    }

    fn fitted(&self) -> Result<&HmmParams, RegimeError> {
        self.params.as_ref().ok_or(RegimeError::NotTrained)
    }

    fn check_regime(&self, regime: usize) -> Result<(), RegimeError> {
        if regime >= self.config.n_regimes {
            return Err(RegimeError::InvalidRegime {
                regime,
                n_regimes: self.config.n_regimes,
            });
        }
        Ok(())
    }
}

impl Retrainable for RegimeModel {
    type Error = RegimeError;

    fn retrain(&self, observations: &[f64]) -> Result<Self, RegimeError> {
        let (params, report) = hmm::fit(
            observations,
            self.config.n_regimes,
            self.config.max_iterations,
            self.config.tolerance,
            self.config.min_variance,
        )?;

        Ok(Self {
            config: self.config.clone(),
            params: Some(params),
            last_fit: Some(report),
        })
    }
}
