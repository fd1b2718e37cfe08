use async_trait::async_trait;

use super::HostError;

/// Read-only view of the account
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortfolioPort: Send + Sync {
    /// Uninvested cash across the whole account
    async fn cash(&self) -> Result<f64, HostError>;

    /// Whether any shares of `instrument` are held
    async fn invested(&self, instrument: &str) -> Result<bool, HostError>;
}
