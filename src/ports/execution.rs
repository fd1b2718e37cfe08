use async_trait::async_trait;

use super::HostError;
use crate::domain::OrderRecord;

/// Order submission
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    /// Submit a market order for `shares` (negative sells). Zero-share orders are
    /// accepted as no-ops. Returns what the host filled.
    async fn submit_order(&self, instrument: &str, shares: i64) -> Result<OrderRecord, HostError>;
}
