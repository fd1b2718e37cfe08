//! Market Regime Detection Module
//!
//! Discrete hidden-state ("regime") inference over price ratios:
//!
//! - **Gaussian HMM**: Baum-Welch fitting and Viterbi decoding for 1-D observations
//! - **Regime Model**: train / predict / parameter extraction contract used by the
//!   orchestrator, retrained daily on a sliding window
//!
//! Regimes are labelled in ascending order of their mean ratio after every fit,
//! so regime 0 is the most bearish state and regime K-1 the most bullish.

pub mod hmm;
pub mod model;

pub use hmm::{FitReport, HmmParams};
pub use model::{RegimeModel, RegimeModelConfig};

use serde::Serialize;
use thiserror::Error;

/// Regime model errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegimeError {
    #[error("Model has not been trained")]
    NotTrained,

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: requires {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Regime {regime} out of range for {n_regimes}-regime model")]
    InvalidRegime { regime: usize, n_regimes: usize },

    #[error("Observation {0} is not finite")]
    NonFinite(usize),

    #[error("Fit diverged: {0}")]
    FitDiverged(String),
}

/// A model whose fitted state can be rebuilt from fresh observations without
/// mutating the current state.
pub trait Retrainable: Sized {
    type Error;

    /// Fit a new state from `observations`, starting from this one's settings
    fn retrain(&self, observations: &[f64]) -> Result<Self, Self::Error>;
}

/// Result of one prediction call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeInference {
    /// Most likely regime for the latest observation
    pub regime: usize,
    /// Fitted mean ratio of that regime
    pub mean: f64,
    /// Transition probabilities out of that regime
    pub transition_row: Vec<f64>,
}

impl RegimeInference {
    pub fn n_regimes(&self) -> usize {
        self.transition_row.len()
    }

    /// Probability that the predicted regime persists for another step
    pub fn persistence(&self) -> Option<f64> {
        self.transition_row.get(self.regime).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_persistence() {
        let inference = RegimeInference {
            regime: 1,
            mean: 1.03,
            transition_row: vec![0.3, 0.7],
        };
        assert_eq!(inference.n_regimes(), 2);
        assert_eq!(inference.persistence(), Some(0.7));
    }

    #[test]
    fn test_inference_out_of_range_persistence() {
        let inference = RegimeInference {
            regime: 5,
            mean: 1.0,
            transition_row: vec![0.5, 0.5],
        };
        assert_eq!(inference.persistence(), None);
    }
}
