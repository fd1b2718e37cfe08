//! Strategy Layer - Regime-based trading signal pipeline
//!
//! - `stationarity`: ADF/KPSS testing and stationarizing transforms
//! - `regime`: Gaussian HMM regime model over price ratios
//! - `decision`: regime inference to buy/sell/hold and position size
//! - `params`: named thresholds for decisions and risk adaptation

pub mod decision;
pub mod params;
pub mod regime;
pub mod stationarity;

pub use decision::{DecisionError, TradeDecision};
pub use params::{DecisionPolicy, ParamsError, RiskAdaptation, StrategyConfig, TierThresholds};
pub use regime::{RegimeError, RegimeInference, RegimeModel, RegimeModelConfig, Retrainable};
pub use stationarity::{
    difference, is_stationary, AdfKpssTest, StationarityError, StationarityTest,
    StationarityTransformer, TransformError, TransformMethod, TransformPlan, TransformTag,
};
