//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config/default.toml.
//! Every section except `[engine]` is optional and falls back to the built-in
//! trading rules.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapters::paper::SyntheticConfig;
use crate::application::{DailySchedule, EngineConfig, TransformSettings};
use crate::strategy::params::{DecisionPolicy, RiskAdaptation, StrategyConfig, TierThresholds};
use crate::strategy::regime::RegimeModelConfig;

/// Environment variable that overrides the config path
pub const CONFIG_PATH_ENV: &str = "REGIME_TRADER_CONFIG";

/// Main configuration structure matching config/default.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineSection,
    #[serde(default)]
    pub decision: DecisionSection,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub transform: TransformSection,
    #[serde(default)]
    pub paper: PaperSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Instruments, capital and regime model
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Tickers to trade
    pub instruments: Vec<String>,
    /// Cash split evenly across instruments at startup
    #[serde(default = "default_starting_cash")]
    pub starting_cash: f64,
    /// Closing prices kept per instrument
    #[serde(default = "default_lookback")]
    pub lookback_period: usize,
    /// Hidden regimes per model
    #[serde(default = "default_regimes")]
    pub n_regimes: usize,
    /// Baum-Welch iteration budget
    #[serde(default = "default_iterations")]
    pub max_iterations: usize,
    /// Log-likelihood gain below which fitting stops
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Variance floor for every regime
    #[serde(default = "default_min_variance")]
    pub min_variance: f64,
}

/// Decision labels and confidence tiers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecisionSection {
    pub bullish_regime: usize,
    pub bearish_regime: usize,
    pub two_regime_high: f64,
    pub two_regime_medium: f64,
    pub multi_regime_high: f64,
    pub multi_regime_medium: f64,
    pub medium_scale: f64,
    pub low_scale: f64,
}

impl Default for DecisionSection {
    fn default() -> Self {
        let policy = DecisionPolicy::default();
        Self {
            bullish_regime: policy.bullish_regime,
            bearish_regime: policy.bearish_regime,
            two_regime_high: policy.two_regime_tiers.high,
            two_regime_medium: policy.two_regime_tiers.medium,
            multi_regime_high: policy.multi_regime_tiers.high,
            multi_regime_medium: policy.multi_regime_tiers.medium,
            medium_scale: policy.medium_scale,
            low_scale: policy.low_scale,
        }
    }
}

/// Risk fraction adaptation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub initial_risk_fraction: f64,
    pub min_risk_fraction: f64,
    pub max_risk_fraction: f64,
    /// |ratio - 1| below this grows risk
    pub accurate_band: f64,
    /// |ratio - 1| above this shrinks risk
    pub inaccurate_band: f64,
    pub increase_step: f64,
    pub decrease_step: f64,
}

impl Default for RiskSection {
    fn default() -> Self {
        let risk = RiskAdaptation::default();
        Self {
            initial_risk_fraction: risk.initial_risk_fraction,
            min_risk_fraction: risk.min_risk_fraction,
            max_risk_fraction: risk.max_risk_fraction,
            accurate_band: risk.accurate_band,
            inaccurate_band: risk.inaccurate_band,
            increase_step: risk.increase_step,
            decrease_step: risk.decrease_step,
        }
    }
}

/// Local wall-clock trigger times, `HH:MM`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub market_open: String,
    pub after_close: String,
    /// Seconds between stop-flag checks while waiting
    pub poll_interval_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            market_open: "10:00".to_string(),
            after_close: "17:00".to_string(),
            poll_interval_secs: 30,
        }
    }
}

impl ScheduleSection {
    pub fn to_schedule(&self) -> Result<DailySchedule, ConfigError> {
        DailySchedule::parse(&self.market_open, &self.after_close)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Stationarity diagnostics
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformSection {
    /// `auto<d>` or an explicit step string such as `ln1`
    pub method: String,
    /// Rolling mean window for `r` steps
    pub rolling_window: usize,
    /// Check each instrument's ratios at startup
    pub check_ratios: bool,
}

impl Default for TransformSection {
    fn default() -> Self {
        let settings = TransformSettings::default();
        Self {
            method: settings.method,
            rolling_window: settings.window,
            check_ratios: settings.check_ratios,
        }
    }
}

/// Paper market used by `run` and `simulate`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaperSection {
    /// JSON file of `{"TICKER": [closes]}`; synthetic paths when unset
    pub price_file: Option<String>,
    /// Synthetic days per instrument
    pub days: usize,
    pub seed: u64,
    pub start_price: f64,
    pub drift: f64,
    pub volatility: f64,
    pub regime_length: usize,
}

impl Default for PaperSection {
    fn default() -> Self {
        let synthetic = SyntheticConfig::default();
        Self {
            price_file: None,
            days: synthetic.days,
            seed: synthetic.seed,
            start_price: synthetic.start_price,
            drift: synthetic.drift,
            volatility: synthetic.volatility,
            regime_length: synthetic.regime_length,
        }
    }
}

impl PaperSection {
    /// Price file path with `~` and environment variables expanded
    pub fn price_file_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        self.price_file
            .as_deref()
            .map(|p| {
                shellexpand::full(p)
                    .map(|expanded| PathBuf::from(expanded.as_ref()))
                    .map_err(|e| ConfigError::ValidationError(format!("price_file: {}", e)))
            })
            .transpose()
    }

    pub fn synthetic(&self) -> SyntheticConfig {
        SyntheticConfig {
            days: self.days,
            start_price: self.start_price,
            drift: self.drift,
            volatility: self.volatility,
            regime_length: self.regime_length,
            seed: self.seed,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_starting_cash() -> f64 {
    1_000_000.0
}

fn default_lookback() -> usize {
    30
}

fn default_regimes() -> usize {
    2
}

fn default_iterations() -> usize {
    RegimeModelConfig::default().max_iterations
}

fn default_tolerance() -> f64 {
    RegimeModelConfig::default().tolerance
}

fn default_min_variance() -> f64 {
    RegimeModelConfig::default().min_variance
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Config path from `REGIME_TRADER_CONFIG` when set, else `fallback`, with `~`
/// expanded
pub fn resolve_config_path(fallback: &Path) -> PathBuf {
    let raw = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string_lossy().into_owned());
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.instruments.is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.instruments cannot be empty".to_string(),
            ));
        }

        if !(self.engine.starting_cash >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "starting_cash must be >= 0, got {}",
                self.engine.starting_cash
            )));
        }

        if self.paper.days <= self.engine.lookback_period && self.paper.price_file.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "paper.days ({}) must exceed lookback_period ({})",
                self.paper.days, self.engine.lookback_period
            )));
        }

        self.schedule.to_schedule()?;

        if self.schedule.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        // Strategy thresholds and the transform method
        EngineConfig::from(self)
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(())
    }
}

impl From<&Config> for StrategyConfig {
    fn from(config: &Config) -> Self {
        StrategyConfig {
            lookback_period: config.engine.lookback_period,
            model: RegimeModelConfig {
                n_regimes: config.engine.n_regimes,
                max_iterations: config.engine.max_iterations,
                tolerance: config.engine.tolerance,
                min_variance: config.engine.min_variance,
            },
            decision: DecisionPolicy {
                bullish_regime: config.decision.bullish_regime,
                bearish_regime: config.decision.bearish_regime,
                two_regime_tiers: TierThresholds {
                    high: config.decision.two_regime_high,
                    medium: config.decision.two_regime_medium,
                },
                multi_regime_tiers: TierThresholds {
                    high: config.decision.multi_regime_high,
                    medium: config.decision.multi_regime_medium,
                },
                medium_scale: config.decision.medium_scale,
                low_scale: config.decision.low_scale,
            },
            risk: RiskAdaptation {
                initial_risk_fraction: config.risk.initial_risk_fraction,
                min_risk_fraction: config.risk.min_risk_fraction,
                max_risk_fraction: config.risk.max_risk_fraction,
                accurate_band: config.risk.accurate_band,
                inaccurate_band: config.risk.inaccurate_band,
                increase_step: config.risk.increase_step,
                decrease_step: config.risk.decrease_step,
            },
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        EngineConfig {
            instruments: config.engine.instruments.clone(),
            starting_cash: config.engine.starting_cash,
            strategy: StrategyConfig::from(config),
            transform: TransformSettings {
                method: config.transform.method.clone(),
                window: config.transform.rolling_window,
                check_ratios: config.transform.check_ratios,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[engine]
instruments = ["ARKK", "AAPL", "CRM", "SHOP", "MRNA"]
starting_cash = 1000000.0
lookback_period = 30
n_regimes = 2
max_iterations = 1000

[decision]
bullish_regime = 1
bearish_regime = 0
two_regime_high = 0.7
two_regime_medium = 0.6

[risk]
initial_risk_fraction = 0.05
increase_step = 0.005
decrease_step = 0.003

[schedule]
market_open = "10:00"
after_close = "17:00"

[transform]
method = "auto1"
rolling_window = 3

[paper]
days = 90
seed = 7

[logging]
level = "info"
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.engine.instruments.len(), 5);
        assert_eq!(config.engine.lookback_period, 30);
        assert_eq!(config.risk.initial_risk_fraction, 0.05);
        assert_eq!(config.paper.seed, 7);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config("[engine]\ninstruments = [\"AAPL\"]\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.engine.starting_cash, 1_000_000.0);
        assert_eq!(config.decision.two_regime_high, 0.7);
        assert_eq!(config.decision.multi_regime_medium, 0.4);
        assert_eq!(config.risk.inaccurate_band, 0.10);
        assert_eq!(config.schedule.market_open, "10:00");
        assert_eq!(config.transform.method, "auto1");
        assert!(config.paper.price_file.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[engine\ninstruments = 3");
        assert!(matches!(load_config(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_empty_instruments() {
        let file = write_config("[engine]\ninstruments = []\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_tiers() {
        let config = create_valid_config().replace("two_regime_medium = 0.6", "two_regime_medium = 0.9");
        let file = write_config(&config);
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_transform_method() {
        let config = create_valid_config().replace("method = \"auto1\"", "method = \"lq\"");
        let file = write_config(&config);
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_schedule() {
        let config = create_valid_config().replace("after_close = \"17:00\"", "after_close = \"5pm\"");
        let file = write_config(&config);
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_to_engine_config() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();
        let engine = EngineConfig::from(&config);

        assert_eq!(engine.instruments[0], "ARKK");
        assert_eq!(engine.starting_cash, 1_000_000.0);
        assert_eq!(engine.strategy.lookback_period, 30);
        assert_eq!(engine.strategy.model.n_regimes, 2);
        assert_eq!(engine.strategy.decision.two_regime_tiers.high, 0.7);
        assert_eq!(engine.strategy.risk.decrease_step, 0.003);
        assert_eq!(engine.transform.window, 3);
    }

    #[test]
    fn test_paper_section() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();
        let synthetic = config.paper.synthetic();
        assert_eq!(synthetic.days, 90);
        assert_eq!(synthetic.seed, 7);
        assert!(config.paper.price_file_path().unwrap().is_none());

        let mut paper = config.paper.clone();
        paper.price_file = Some("prices.json".to_string());
        assert_eq!(paper.price_file_path().unwrap(), Some(PathBuf::from("prices.json")));
    }
}
