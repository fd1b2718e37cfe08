//! Paper trading session
//!
//! Couples an orchestrator with the paper market that serves it, so the day
//! cursor advances after every close. Used for back-to-back simulation and
//! for scheduled paper runs.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use super::orchestrator::{CycleReport, EngineConfig, EngineSnapshot, Host, Orchestrator, OrchestratorError};
use super::scheduler::{ScheduledEvent, ScheduledTask};
use crate::adapters::paper::{PaperMarket, PaperSnapshot};

/// Result of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub days_simulated: usize,
    pub starting_cash: f64,
    pub final_equity: f64,
    pub return_pct: f64,
    pub orders_submitted: usize,
    pub skipped_instrument_cycles: usize,
    pub account: PaperSnapshot,
    pub engine: EngineSnapshot,
}

pub struct PaperSession {
    orchestrator: Orchestrator,
    market: Arc<PaperMarket>,
    starting_cash: f64,
    days: usize,
    orders: usize,
    skipped: usize,
}

impl PaperSession {
    pub fn new(config: EngineConfig, market: Arc<PaperMarket>) -> Result<Self, OrchestratorError> {
        let starting_cash = config.starting_cash;
        let orchestrator = Orchestrator::new(config, Host::from_shared(market.clone()))?;
        Ok(Self {
            orchestrator,
            market,
            starting_cash,
            days: 0,
            orders: 0,
            skipped: 0,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn initialize(&mut self) -> Result<CycleReport, OrchestratorError> {
        let report = self.orchestrator.initialize().await?;
        self.skipped += report.skipped.len();
        Ok(report)
    }

    /// Market open, after close, then advance the cursor. Returns `false` when
    /// the price paths are exhausted.
    pub async fn run_day(&mut self) -> Result<bool, OrchestratorError> {
        let open = self.orchestrator.market_open().await?;
        self.orders += open.orders.iter().filter(|(_, shares)| *shares != 0).count();
        self.skipped += open.skipped.len();

        let close = self.orchestrator.after_close().await?;
        self.skipped += close.skipped.len();
        self.days += 1;

        Ok(self.market.advance_day().await)
    }

    /// Initialize if needed, then run up to `days` trading days
    pub async fn simulate(&mut self, days: usize) -> Result<SimulationSummary, OrchestratorError> {
        if !self.orchestrator.is_initialized() {
            self.initialize().await?;
        }

        for _ in 0..days {
            if !self.run_day().await? {
                tracing::info!("Price data exhausted after {} days", self.days);
                break;
            }
        }
        Ok(self.summary().await)
    }

    pub async fn summary(&self) -> SimulationSummary {
        let account = self.market.snapshot().await;
        let return_pct = if self.starting_cash > 0.0 {
            (account.equity / self.starting_cash - 1.0) * 100.0
        } else {
            0.0
        };
        SimulationSummary {
            days_simulated: self.days,
            starting_cash: self.starting_cash,
            final_equity: account.equity,
            return_pct,
            orders_submitted: self.orders,
            skipped_instrument_cycles: self.skipped,
            account,
            engine: self.orchestrator.snapshot(),
        }
    }
}

#[async_trait]
impl ScheduledTask for PaperSession {
    async fn on_event(&mut self, event: ScheduledEvent) -> Result<(), OrchestratorError> {
        match event {
            ScheduledEvent::MarketOpen => {
                let report = self.orchestrator.market_open().await?;
                self.orders += report.orders.iter().filter(|(_, s)| *s != 0).count();
                self.skipped += report.skipped.len();
            }
            ScheduledEvent::AfterClose => {
                let report = self.orchestrator.after_close().await?;
                self.skipped += report.skipped.len();
                self.days += 1;
                if !self.market.advance_day().await {
                    tracing::warn!("Paper market has no more days; later cycles repeat the last day");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::paper::SyntheticConfig;

    fn session(days: usize) -> PaperSession {
        let names = vec!["AAA".to_string(), "BBB".to_string()];
        let market = PaperMarket::synthetic(
            &names,
            &SyntheticConfig::default().with_days(days),
            10_000.0,
            30,
        )
        .unwrap();
        let mut config = EngineConfig::default()
            .with_instruments(names)
            .with_starting_cash(10_000.0);
        config.transform.check_ratios = false;
        PaperSession::new(config, Arc::new(market)).unwrap()
    }

    #[tokio::test]
    async fn test_simulation_runs_requested_days() {
        let mut session = session(60);
        let summary = session.simulate(10).await.unwrap();
        assert_eq!(summary.days_simulated, 10);
        assert_eq!(summary.engine.market_opens, 10);
        assert_eq!(summary.engine.after_closes, 10);
        assert!(summary.final_equity > 0.0);
    }

    #[tokio::test]
    async fn test_simulation_stops_at_end_of_data() {
        let mut session = session(35);
        let summary = session.simulate(100).await.unwrap();
        // Days 30..=34 are tradeable
        assert_eq!(summary.days_simulated, 5);
    }

    #[tokio::test]
    async fn test_scheduled_events_advance_market() {
        let mut session = session(40);
        session.initialize().await.unwrap();
        let day = session.market.day().await;

        session.on_event(ScheduledEvent::MarketOpen).await.unwrap();
        session.on_event(ScheduledEvent::AfterClose).await.unwrap();
        assert_eq!(session.market.day().await, day + 1);
        assert_eq!(session.summary().await.days_simulated, 1);
    }
}
