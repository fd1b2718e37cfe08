//! Seeded regime-switching price paths
//!
//! Geometric random walk whose drift flips sign every `regime_length` days, so
//! the generated series has the bull/bear structure the regime model looks for.

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::collections::BTreeMap;

use super::PaperError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Days generated per instrument
    pub days: usize,
    pub start_price: f64,
    /// Absolute daily log drift; the sign alternates between regimes
    pub drift: f64,
    /// Daily log volatility
    pub volatility: f64,
    /// Days spent in each regime before the drift flips
    pub regime_length: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            days: 120,
            start_price: 100.0,
            drift: 0.01,
            volatility: 0.01,
            regime_length: 10,
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    pub fn with_days(mut self, days: usize) -> Self {
        self.days = days;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// One price path of `config.days` closes
pub fn generate_path(config: &SyntheticConfig, rng: &mut StdRng) -> Result<Vec<f64>, PaperError> {
    if !(config.start_price > 0.0) || config.regime_length == 0 {
        return Err(PaperError::InvalidConfig(format!(
            "start_price must be > 0 and regime_length > 0, got {} and {}",
            config.start_price, config.regime_length
        )));
    }
    let noise = Normal::new(0.0, config.volatility)
        .map_err(|e| PaperError::InvalidConfig(e.to_string()))?;

    let mut price = config.start_price;
    let mut path = Vec::with_capacity(config.days);
    for day in 0..config.days {
        let bullish = (day / config.regime_length) % 2 == 1;
        let drift = if bullish { config.drift } else { -config.drift };
        price *= (drift + noise.sample(rng)).exp();
        path.push(price);
    }
    Ok(path)
}

/// Independent paths for each instrument from a single seed
pub fn generate_paths(
    instruments: &[String],
    config: &SyntheticConfig,
) -> Result<BTreeMap<String, Vec<f64>>, PaperError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    instruments
        .iter()
        .map(|name| Ok((name.clone(), generate_path(config, &mut rng)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["AAA".to_string(), "BBB".to_string()]
    }

    #[test]
    fn test_paths_are_positive_and_sized() {
        let paths = generate_paths(&names(), &SyntheticConfig::default().with_days(60)).unwrap();
        assert_eq!(paths.len(), 2);
        for path in paths.values() {
            assert_eq!(path.len(), 60);
            assert!(path.iter().all(|p| *p > 0.0 && p.is_finite()));
        }
    }

    #[test]
    fn test_same_seed_same_paths() {
        let config = SyntheticConfig::default().with_seed(7);
        assert_eq!(
            generate_paths(&names(), &config).unwrap(),
            generate_paths(&names(), &config).unwrap()
        );
    }

    #[test]
    fn test_instruments_differ() {
        let paths = generate_paths(&names(), &SyntheticConfig::default()).unwrap();
        assert_ne!(paths["AAA"], paths["BBB"]);
    }

    #[test]
    fn test_invalid_config() {
        let config = SyntheticConfig {
            regime_length: 0,
            ..SyntheticConfig::default()
        };
        assert!(generate_paths(&names(), &config).is_err());
    }
}
