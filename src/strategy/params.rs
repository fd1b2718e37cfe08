//! Strategy Parameters
//!
//! Named configuration for every threshold the decision and risk policies use.
//! Defaults reproduce the reference trading rules: 2-regime tiers 0.7/0.6,
//! 3-regime tiers 0.5/0.4, risk +0.5% inside a 5% band, -0.3% outside 10%.

use serde::{Deserialize, Serialize};

use super::regime::RegimeModelConfig;

/// Main strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Closing prices kept per instrument
    pub lookback_period: usize,
    /// Regime model settings
    pub model: RegimeModelConfig,
    /// Buy/sell/hold and sizing rules
    pub decision: DecisionPolicy,
    /// Risk fraction adaptation
    pub risk: RiskAdaptation,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            lookback_period: 30,
            model: RegimeModelConfig::default(),
            decision: DecisionPolicy::default(),
            risk: RiskAdaptation::default(),
        }
    }
}

impl StrategyConfig {
    /// Create a new config with a custom lookback period
    pub fn with_lookback(mut self, period: usize) -> Self {
        self.lookback_period = period;
        self
    }

    /// Create a new config with a custom regime count
    pub fn with_regimes(mut self, n_regimes: usize) -> Self {
        self.model.n_regimes = n_regimes;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.model
            .validate()
            .map_err(|e| ParamsError::InvalidModel(e.to_string()))?;

        // The HMM needs at least two ratios per regime
        let min_lookback = 2 * self.model.n_regimes + 1;
        if self.lookback_period < min_lookback {
            return Err(ParamsError::InvalidLookback(self.lookback_period, min_lookback));
        }

        self.decision.validate(self.model.n_regimes)?;
        self.risk.validate()?;
        Ok(())
    }
}

/// Confidence thresholds on the regime persistence probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// At or above: commit the full risk fraction
    pub high: f64,
    /// At or above: commit `medium_scale` of the risk fraction
    pub medium: f64,
}

impl TierThresholds {
    fn validate(&self) -> Result<(), ParamsError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.high) || !in_unit(self.medium) || self.medium > self.high {
            return Err(ParamsError::InvalidTiers(self.high, self.medium));
        }
        Ok(())
    }
}

/// Decision and position sizing policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// Regime index that permits buying
    pub bullish_regime: usize,
    /// Regime index that permits selling
    pub bearish_regime: usize,
    /// Tiers for a 2-regime model
    pub two_regime_tiers: TierThresholds,
    /// Tiers for models with 3 or more regimes
    pub multi_regime_tiers: TierThresholds,
    /// Fraction of the risk budget committed at medium confidence
    pub medium_scale: f64,
    /// Fraction of the risk budget committed at low confidence
    pub low_scale: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            bullish_regime: 1,
            bearish_regime: 0,
            two_regime_tiers: TierThresholds { high: 0.7, medium: 0.6 },
            multi_regime_tiers: TierThresholds { high: 0.5, medium: 0.4 },
            medium_scale: 0.5,
            low_scale: 0.1,
        }
    }
}

impl DecisionPolicy {
    /// Tier thresholds for a model with `n_regimes` regimes
    pub fn tiers_for(&self, n_regimes: usize) -> TierThresholds {
        if n_regimes <= 2 {
            self.two_regime_tiers
        } else {
            self.multi_regime_tiers
        }
    }

    /// Scale applied to `risk * cash` for a given persistence probability
    pub fn sizing_scale(&self, n_regimes: usize, probability: f64) -> f64 {
        let tiers = self.tiers_for(n_regimes);
        if probability >= tiers.high {
            1.0
        } else if probability >= tiers.medium {
            self.medium_scale
        } else {
            self.low_scale
        }
    }

    pub fn validate(&self, n_regimes: usize) -> Result<(), ParamsError> {
        if self.bullish_regime == self.bearish_regime {
            return Err(ParamsError::InvalidRegimeLabels(self.bullish_regime, self.bearish_regime));
        }
        if self.bullish_regime >= n_regimes || self.bearish_regime >= n_regimes {
            return Err(ParamsError::InvalidRegimeLabels(self.bullish_regime, self.bearish_regime));
        }
        self.two_regime_tiers.validate()?;
        self.multi_regime_tiers.validate()?;

        // Scales must shrink with confidence to keep sizing monotonic
        if !(0.0..=1.0).contains(&self.medium_scale)
            || !(0.0..=1.0).contains(&self.low_scale)
            || self.low_scale > self.medium_scale
        {
            return Err(ParamsError::InvalidScales(self.medium_scale, self.low_scale));
        }
        Ok(())
    }
}

/// Risk fraction adaptation driven by prediction accuracy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAdaptation {
    /// Starting risk fraction per instrument
    pub initial_risk_fraction: f64,
    /// Lower clamp for the adapted risk fraction
    pub min_risk_fraction: f64,
    /// Upper clamp for the adapted risk fraction
    pub max_risk_fraction: f64,
    /// |ratio - 1| strictly below this increases risk
    pub accurate_band: f64,
    /// |ratio - 1| strictly above this decreases risk
    pub inaccurate_band: f64,
    /// Added on an accurate prediction
    pub increase_step: f64,
    /// Subtracted on an inaccurate prediction
    pub decrease_step: f64,
}

impl Default for RiskAdaptation {
    fn default() -> Self {
        Self {
            initial_risk_fraction: 0.05,
            min_risk_fraction: 0.001,
            max_risk_fraction: 1.0,
            accurate_band: 0.05,
            inaccurate_band: 0.10,
            increase_step: 0.005,
            decrease_step: 0.003,
        }
    }
}

impl RiskAdaptation {
    /// Next risk fraction given the `last_prediction / price` accuracy ratio.
    ///
    /// Inside the accurate band the fraction grows by `increase_step`; beyond the
    /// inaccurate band it shrinks by `decrease_step`; otherwise it is unchanged.
    /// The result is clamped to `[min_risk_fraction, max_risk_fraction]`.
    pub fn adapt(&self, risk_fraction: f64, prediction_ratio: f64) -> f64 {
        if !prediction_ratio.is_finite() {
            return risk_fraction;
        }
        let deviation = (prediction_ratio - 1.0).abs();
        let next = if deviation < self.accurate_band {
            risk_fraction + self.increase_step
        } else if deviation > self.inaccurate_band {
            risk_fraction - self.decrease_step
        } else {
            risk_fraction
        };
        next.clamp(self.min_risk_fraction, self.max_risk_fraction)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.min_risk_fraction > 0.0)
            || self.max_risk_fraction > 1.0
            || self.min_risk_fraction > self.max_risk_fraction
        {
            return Err(ParamsError::InvalidRiskBounds(
                self.min_risk_fraction,
                self.max_risk_fraction,
            ));
        }
        if self.initial_risk_fraction < self.min_risk_fraction
            || self.initial_risk_fraction > self.max_risk_fraction
        {
            return Err(ParamsError::InvalidRiskFraction(self.initial_risk_fraction));
        }
        if self.accurate_band < 0.0 || self.inaccurate_band < self.accurate_band {
            return Err(ParamsError::InvalidBands(self.accurate_band, self.inaccurate_band));
        }
        if self.increase_step < 0.0 || self.decrease_step < 0.0 {
            return Err(ParamsError::InvalidSteps(self.increase_step, self.decrease_step));
        }
        Ok(())
    }
}

/// Parameter validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid lookback period: {0} (minimum {1})")]
    InvalidLookback(usize, usize),
    #[error("Invalid regime model: {0}")]
    InvalidModel(String),
    #[error("Invalid regime labels: bullish {0}, bearish {1} (must differ and be < regime count)")]
    InvalidRegimeLabels(usize, usize),
    #[error("Invalid confidence tiers: high {0}, medium {1} (must be 0 <= medium <= high <= 1)")]
    InvalidTiers(f64, f64),
    #[error("Invalid sizing scales: medium {0}, low {1} (must be 0 <= low <= medium <= 1)")]
    InvalidScales(f64, f64),
    #[error("Invalid risk bounds: min {0}, max {1} (must be 0 < min <= max <= 1)")]
    InvalidRiskBounds(f64, f64),
    #[error("Invalid initial risk fraction: {0}")]
    InvalidRiskFraction(f64),
    #[error("Invalid accuracy bands: accurate {0}, inaccurate {1}")]
    InvalidBands(f64, f64),
    #[error("Invalid risk steps: increase {0}, decrease {1}")]
    InvalidSteps(f64, f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = StrategyConfig::default();
        assert_eq!(config.lookback_period, 30);
        assert_eq!(config.model.n_regimes, 2);
        assert_eq!(config.risk.initial_risk_fraction, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StrategyConfig::default().with_lookback(40).with_regimes(3);
        assert_eq!(config.lookback_period, 40);
        assert_eq!(config.model.n_regimes, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_lookback() {
        let config = StrategyConfig::default().with_lookback(4);
        assert!(matches!(config.validate(), Err(ParamsError::InvalidLookback(4, 5))));
    }

    #[test]
    fn test_invalid_regime_count() {
        let config = StrategyConfig::default().with_regimes(1);
        assert!(matches!(config.validate(), Err(ParamsError::InvalidModel(_))));
    }

    #[test]
    fn test_sizing_scale_tiers() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.sizing_scale(2, 0.7), 1.0);
        assert_eq!(policy.sizing_scale(2, 0.65), 0.5);
        assert_eq!(policy.sizing_scale(2, 0.55), 0.1);
        assert_eq!(policy.sizing_scale(3, 0.5), 1.0);
        assert_eq!(policy.sizing_scale(3, 0.45), 0.5);
        assert_eq!(policy.sizing_scale(3, 0.3), 0.1);
    }

    #[test]
    fn test_regime_labels_must_differ() {
        let mut policy = DecisionPolicy::default();
        policy.bearish_regime = 1;
        assert!(matches!(policy.validate(2), Err(ParamsError::InvalidRegimeLabels(1, 1))));
    }

    #[test]
    fn test_inverted_tiers_rejected() {
        let mut policy = DecisionPolicy::default();
        policy.two_regime_tiers = TierThresholds { high: 0.5, medium: 0.6 };
        assert!(matches!(policy.validate(2), Err(ParamsError::InvalidTiers(_, _))));
    }

    #[test]
    fn test_risk_adaptation_bands() {
        let risk = RiskAdaptation::default();
        assert_relative_eq!(risk.adapt(0.05, 1.02), 0.055, epsilon = 1e-12);
        assert_relative_eq!(risk.adapt(0.05, 0.97), 0.055, epsilon = 1e-12);
        assert_relative_eq!(risk.adapt(0.05, 1.07), 0.05, epsilon = 1e-12);
        assert_relative_eq!(risk.adapt(0.05, 0.85), 0.047, epsilon = 1e-12);
        assert_relative_eq!(risk.adapt(0.05, 1.2), 0.047, epsilon = 1e-12);
    }

    #[test]
    fn test_risk_adaptation_clamped() {
        let risk = RiskAdaptation::default();
        assert_relative_eq!(risk.adapt(0.002, 2.0), 0.001, epsilon = 1e-12);
        assert_relative_eq!(risk.adapt(0.999, 1.0), 1.0, epsilon = 1e-12);
        assert_eq!(risk.adapt(0.05, f64::NAN), 0.05);
    }

    #[test]
    fn test_risk_config_validation() {
        let mut risk = RiskAdaptation::default();
        assert!(risk.validate().is_ok());

        risk.initial_risk_fraction = 1.5;
        assert!(risk.validate().is_err());

        let mut risk = RiskAdaptation::default();
        risk.inaccurate_band = 0.01;
        assert!(matches!(risk.validate(), Err(ParamsError::InvalidBands(_, _))));
    }
}
