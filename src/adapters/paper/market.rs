//! In-memory market host
//!
//! Replays per-instrument daily closes with a day cursor. The quote at market
//! open is the geometric midpoint of the previous and the current close; the
//! close is the path value for the day. Orders fill at the open quote.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;

use super::synthetic::{generate_paths, SyntheticConfig};
use super::PaperError;
use crate::domain::{OrderRecord, Portfolio};
use crate::ports::{ExecutionPort, HostError, MarketDataPort, PortfolioPort};

#[derive(Debug)]
struct PaperState {
    paths: BTreeMap<String, Vec<f64>>,
    day: usize,
    portfolio: Portfolio,
    orders: Vec<OrderRecord>,
}

/// End-of-run view of the paper account
#[derive(Debug, Clone, Serialize)]
pub struct PaperSnapshot {
    pub day: usize,
    pub cash: f64,
    pub equity: f64,
    /// Unrealized P&L of open positions
    pub unrealized_pnl: f64,
    pub positions: BTreeMap<String, i64>,
    pub orders_filled: usize,
}

#[derive(Debug)]
pub struct PaperMarket {
    state: Mutex<PaperState>,
}

impl PaperMarket {
    /// Market over explicit close paths; today starts at `start_day`, so
    /// `start_day` closes are history.
    pub fn new(
        paths: BTreeMap<String, Vec<f64>>,
        starting_cash: f64,
        start_day: usize,
    ) -> Result<Self, PaperError> {
        if paths.is_empty() {
            return Err(PaperError::InvalidConfig("no instruments".to_string()));
        }
        for (name, path) in &paths {
            if path.len() <= start_day {
                return Err(PaperError::InvalidConfig(format!(
                    "{} has {} closes, needs more than {}",
                    name,
                    path.len(),
                    start_day
                )));
            }
            if let Some(bad) = path.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
                return Err(PaperError::InvalidConfig(format!(
                    "{} contains invalid price {}",
                    name, bad
                )));
            }
        }
        if !(starting_cash >= 0.0) {
            return Err(PaperError::InvalidConfig(format!(
                "starting cash must be >= 0, got {}",
                starting_cash
            )));
        }

        Ok(Self {
            state: Mutex::new(PaperState {
                paths,
                day: start_day,
                portfolio: Portfolio::new(starting_cash),
                orders: Vec::new(),
            }),
        })
    }

    /// Load `{"TICKER": [close, ...], ...}` from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(
        path: P,
        starting_cash: f64,
        start_day: usize,
    ) -> Result<Self, PaperError> {
        let content = std::fs::read_to_string(path)?;
        let paths: BTreeMap<String, Vec<f64>> = serde_json::from_str(&content)?;
        Self::new(paths, starting_cash, start_day)
    }

    /// Seeded regime-switching paths for `instruments`
    pub fn synthetic(
        instruments: &[String],
        config: &SyntheticConfig,
        starting_cash: f64,
        start_day: usize,
    ) -> Result<Self, PaperError> {
        Self::new(generate_paths(instruments, config)?, starting_cash, start_day)
    }

    pub async fn day(&self) -> usize {
        self.state.lock().await.day
    }

    /// Days left including today
    pub async fn remaining_days(&self) -> usize {
        let state = self.state.lock().await;
        let len = state.paths.values().map(Vec::len).min().unwrap_or(0);
        len.saturating_sub(state.day)
    }

    /// Move to the next trading day and mark positions at the new closes.
    /// Returns `false` once the paths are exhausted.
    pub async fn advance_day(&self) -> bool {
        let mut state = self.state.lock().await;
        let len = state.paths.values().map(Vec::len).min().unwrap_or(0);
        if state.day + 1 >= len {
            return false;
        }
        state.day += 1;
        Self::mark_to_close(&mut state);
        true
    }

    pub async fn orders(&self) -> Vec<OrderRecord> {
        self.state.lock().await.orders.clone()
    }

    pub async fn snapshot(&self) -> PaperSnapshot {
        let mut state = self.state.lock().await;
        Self::mark_to_close(&mut state);
        PaperSnapshot {
            day: state.day,
            cash: state.portfolio.cash,
            equity: state.portfolio.equity(),
            unrealized_pnl: state.portfolio.total_pnl(),
            positions: state
                .portfolio
                .holdings
                .iter()
                .map(|(name, h)| (name.clone(), h.shares))
                .collect(),
            orders_filled: state.orders.iter().filter(|o| o.shares != 0).count(),
        }
    }

    fn mark_to_close(state: &mut PaperState) {
        let day = state.day;
        let closes: Vec<(String, f64)> = state
            .paths
            .iter()
            .filter_map(|(name, path)| path.get(day).map(|p| (name.clone(), *p)))
            .collect();
        for (name, close) in closes {
            state.portfolio.update_holding_price(&name, close);
        }
    }

    fn path<'a>(state: &'a PaperState, instrument: &str) -> Result<&'a [f64], HostError> {
        state
            .paths
            .get(instrument)
            .map(Vec::as_slice)
            .ok_or_else(|| HostError::UnknownInstrument(instrument.to_string()))
    }

    fn open_quote(state: &PaperState, instrument: &str) -> Result<f64, HostError> {
        let path = Self::path(state, instrument)?;
        let close = path.get(state.day).copied().unwrap_or(0.0);
        Ok(match state.day.checked_sub(1).and_then(|d| path.get(d)) {
            Some(previous) => (previous * close).sqrt(),
            None => close,
        })
    }
}

#[async_trait]
impl MarketDataPort for PaperMarket {
    async fn get_history(&self, instrument: &str, lookback: usize) -> Result<Vec<f64>, HostError> {
        let state = self.state.lock().await;
        let path = Self::path(&state, instrument)?;
        let end = state.day.min(path.len());
        if end < lookback {
            return Err(HostError::NoData {
                instrument: instrument.to_string(),
                reason: format!("only {} closes before day {}", end, state.day),
            });
        }
        Ok(path[end - lookback..end].to_vec())
    }

    async fn current_price(&self, instrument: &str) -> Result<f64, HostError> {
        let state = self.state.lock().await;
        Self::open_quote(&state, instrument)
    }

    async fn closing_price(&self, instrument: &str) -> Result<f64, HostError> {
        let state = self.state.lock().await;
        let path = Self::path(&state, instrument)?;
        Ok(path.get(state.day).copied().unwrap_or(0.0))
    }
}

#[async_trait]
impl PortfolioPort for PaperMarket {
    async fn cash(&self) -> Result<f64, HostError> {
        Ok(self.state.lock().await.portfolio.cash)
    }

    async fn invested(&self, instrument: &str) -> Result<bool, HostError> {
        Ok(self.state.lock().await.portfolio.is_invested(instrument))
    }
}

#[async_trait]
impl ExecutionPort for PaperMarket {
    async fn submit_order(&self, instrument: &str, shares: i64) -> Result<OrderRecord, HostError> {
        let mut state = self.state.lock().await;
        let price = Self::open_quote(&state, instrument)?;
        if !(price > 0.0) {
            return Err(HostError::OrderRejected {
                instrument: instrument.to_string(),
                reason: "no quote".to_string(),
            });
        }

        let record = state.portfolio.fill(instrument, shares, price);
        if record.shares != shares {
            tracing::debug!(
                "Paper fill for {} reduced from {} to {} shares",
                instrument,
                shares,
                record.shares
            );
        }
        state.orders.push(record.clone());
        Ok(record)
    }
}
