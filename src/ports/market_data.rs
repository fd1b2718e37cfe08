use async_trait::async_trait;

use super::HostError;

/// Price source for tracked instruments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Most recent `lookback` daily closes, oldest first
    async fn get_history(&self, instrument: &str, lookback: usize) -> Result<Vec<f64>, HostError>;

    /// Latest quote; `0.0` means no quote is available
    async fn current_price(&self, instrument: &str) -> Result<f64, HostError>;

    /// Today's close; `0.0` means the instrument did not trade
    async fn closing_price(&self, instrument: &str) -> Result<f64, HostError>;
}
