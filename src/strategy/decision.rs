//! Trade Decision Engine
//!
//! Turns one regime inference into a bounded capital commitment. The decision is
//! computed once at construction, so buy and sell are mutually exclusive.
//!
//! Sizing commits `scale * risk_fraction * cash`, where `scale` is 1, the medium
//! scale or the low scale depending on how likely the predicted regime is to
//! persist, and never more than `cash`.

use thiserror::Error;

use super::params::DecisionPolicy;
use super::regime::RegimeInference;
use crate::domain::{Decision, TradeIntent};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionError {
    #[error("Invalid current price: {0}")]
    InvalidPrice(f64),

    #[error("Invalid cash amount: {0}")]
    InvalidCash(f64),

    #[error("Invalid risk fraction: {0} (must be in (0, 1])")]
    InvalidRisk(f64),

    #[error("Regime {regime} has no transition probability (row of length {len})")]
    MissingTransition { regime: usize, len: usize },
}

/// Decision for one instrument at one market open
#[derive(Debug, Clone)]
pub struct TradeDecision {
    regime: usize,
    n_regimes: usize,
    current_price: f64,
    predicted_price: f64,
    regime_probability: f64,
    cash: f64,
    risk_fraction: f64,
    invested: bool,
    decision: Decision,
    scale: f64,
}

impl TradeDecision {
    pub fn new(
        inference: &RegimeInference,
        current_price: f64,
        cash: f64,
        risk_fraction: f64,
        invested: bool,
        policy: &DecisionPolicy,
    ) -> Result<Self, DecisionError> {
        if !(current_price.is_finite() && current_price > 0.0) {
            return Err(DecisionError::InvalidPrice(current_price));
        }
        if !cash.is_finite() {
            return Err(DecisionError::InvalidCash(cash));
        }
        if !(risk_fraction > 0.0 && risk_fraction <= 1.0) {
            return Err(DecisionError::InvalidRisk(risk_fraction));
        }
        let regime_probability =
            inference
                .persistence()
                .ok_or(DecisionError::MissingTransition {
                    regime: inference.regime,
                    len: inference.transition_row.len(),
                })?;

        let n_regimes = inference.n_regimes();
        let predicted_price = current_price * inference.mean;

        let decision = if predicted_price > current_price && inference.regime == policy.bullish_regime {
            Decision::Buy
        } else if predicted_price <= current_price && inference.regime == policy.bearish_regime {
            Decision::Sell
        } else {
            Decision::Hold
        };

        Ok(Self {
            regime: inference.regime,
            n_regimes,
            current_price,
            predicted_price,
            regime_probability,
            cash,
            risk_fraction,
            invested,
            decision,
            scale: policy.sizing_scale(n_regimes, regime_probability),
        })
    }

    pub fn regime(&self) -> usize {
        self.regime
    }

    pub fn n_regimes(&self) -> usize {
        self.n_regimes
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    /// `current_price * regime_mean`
    pub fn predicted_price(&self) -> f64 {
        self.predicted_price
    }

    /// Self-transition probability of the predicted regime
    pub fn regime_probability(&self) -> f64 {
        self.regime_probability
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn should_buy(&self) -> bool {
        self.decision == Decision::Buy
    }

    pub fn should_sell(&self) -> bool {
        self.decision == Decision::Sell
    }

    /// Capital to commit to a buy; zero without cash
    pub fn bullish(&self) -> f64 {
        if self.cash > 0.0 {
            self.sized()
        } else {
            0.0
        }
    }

    /// Capital to unwind on a sell; zero without a position
    pub fn bearish(&self) -> f64 {
        if self.invested {
            self.sized()
        } else {
            0.0
        }
    }

    /// Decision plus the amount for that side
    pub fn intent(&self) -> TradeIntent {
        let amount = match self.decision {
            Decision::Buy => self.bullish(),
            Decision::Sell => self.bearish(),
            Decision::Hold => 0.0,
        };
        TradeIntent {
            predicted_price: self.predicted_price,
            decision: self.decision,
            amount,
        }
    }

    fn sized(&self) -> f64 {
        let cash = self.cash.max(0.0);
        (self.scale * self.risk_fraction * cash).min(cash)
    }
}
