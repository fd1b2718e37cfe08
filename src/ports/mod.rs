//! Ports Layer - Trait definitions for the host environment
//!
//! The engine never talks to a broker directly. These traits abstract:
//! - Market data (history, quotes, closes)
//! - Portfolio state (cash, open positions)
//! - Order submission

pub mod execution;
pub mod market_data;
pub mod portfolio;

pub use execution::ExecutionPort;
pub use market_data::MarketDataPort;
pub use portfolio::PortfolioPort;

use thiserror::Error;

/// Failures reported by the host environment
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("No data available for {instrument}: {reason}")]
    NoData { instrument: String, reason: String },
    #[error("Order rejected for {instrument}: {reason}")]
    OrderRejected { instrument: String, reason: String },
    #[error("Host unavailable: {0}")]
    Unavailable(String),
}
