//! Domain Layer - Core types for the regime trading engine
//!
//! Pure domain types and logic with no I/O. All external interactions happen
//! through the ports layer.
//!
//! - `trade`: three-way decisions, trade intents and order records
//! - `instrument`: sliding price windows and trend ratios
//! - `portfolio`: cash and share positions
//! - `allocation`: error-weighted cash reallocation

pub mod allocation;
pub mod instrument;
pub mod portfolio;
pub mod trade;

pub use allocation::{equal_split, reallocate_cash};
pub use instrument::{is_valid_price, trend_ratios, PriceWindow, WindowError};
pub use portfolio::{Holding, Portfolio};
pub use trade::{Decision, OrderRecord, TradeIntent};
