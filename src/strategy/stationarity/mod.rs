//! Stationarity Analysis
//!
//! Statistical preprocessing that turns a raw price history into a series
//! whose mean and variance do not drift over time:
//! - `hypothesis`: ADF and KPSS unit-root tests combined into one verdict
//! - `transform`: automatic/explicit transform search with differencing

pub mod hypothesis;
pub mod transform;

pub use hypothesis::{
    adf_test, is_stationary, kpss_test, AdfKpssTest, AdfResult, KpssResult, StationarityTest,
};
pub use transform::{
    difference, make_stationary, rolling_mean, Stationarized, StationarityTransformer,
    TransformMethod, TransformPlan, TransformStep, TransformTag,
};

use thiserror::Error;

/// Numerical failures raised by the hypothesis tests
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StationarityError {
    #[error("Insufficient data: requires {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Series contains non-finite value at index {0}")]
    NonFinite(usize),

    #[error("Regression design matrix is singular")]
    SingularRegression,

    #[error("Series has degenerate variance")]
    DegenerateVariance,
}

/// Transformer failures. Configuration variants are fatal; the caller
/// should not retry them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("Invalid transform step '{0}' (expected one of n, l, s, c, r)")]
    InvalidStep(char),

    #[error("Invalid transform method: {0}")]
    InvalidMethod(String),

    #[error("Differencing offset cannot be zero")]
    ZeroOffset,

    #[error("Rolling window must be > 0")]
    ZeroWindow,

    #[error("Insufficient data: requires {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Transform '{step}' undefined for value {value}")]
    Domain { step: char, value: f64 },

    #[error(transparent)]
    Stationarity(#[from] StationarityError),
}

impl TransformError {
    /// True for mistakes in the method string or parameters rather than
    /// in the data being transformed
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidStep(_) | Self::InvalidMethod(_) | Self::ZeroOffset | Self::ZeroWindow
        )
    }
}
