//! Regime Trading Orchestrator
//!
//! Owns the per-instrument state and runs the three phases of a trading day:
//! initialization (once), market open (predict, size, submit) and after close
//! (slide window, retrain, adapt risk, reallocate cash).
//!
//! Every instrument is processed inside its own error boundary: a failure is
//! logged and that instrument sits out the cycle without touching the others.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{
    is_valid_price, reallocate_cash, Decision, PriceWindow, TradeIntent, WindowError,
};
use crate::ports::{ExecutionPort, HostError, MarketDataPort, PortfolioPort};
use crate::strategy::regime::{RegimeError, RegimeModel};
use crate::strategy::stationarity::{
    AdfKpssTest, StationarityTransformer, TransformError, TransformMethod, TransformStep,
};
use crate::strategy::{DecisionError, StrategyConfig, TradeDecision};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Orchestrator has not been initialized")]
    NotInitialized,
    #[error("No instrument could be initialized")]
    NoInstruments,
    #[error("Host error: {0}")]
    HostError(#[from] HostError),
    #[error("Price window error: {0}")]
    WindowError(#[from] WindowError),
    #[error("Regime model error: {0}")]
    RegimeError(#[from] RegimeError),
    #[error("Decision error: {0}")]
    DecisionError(#[from] DecisionError),
    #[error("Transform error: {0}")]
    TransformError(#[from] TransformError),
}

/// Stationarity diagnostics run over each instrument's ratios at startup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformSettings {
    /// Method string, e.g. `auto1` or `ln1`
    pub method: String,
    /// Rolling mean window for `r` steps
    pub window: usize,
    /// Run the diagnostics during initialization
    pub check_ratios: bool,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            method: "auto1".to_string(),
            window: 3,
            check_ratios: true,
        }
    }
}

/// Everything the orchestrator needs to run
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub instruments: Vec<String>,
    pub starting_cash: f64,
    pub strategy: StrategyConfig,
    pub transform: TransformSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            starting_cash: 1_000_000.0,
            strategy: StrategyConfig::default(),
            transform: TransformSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_instruments<I, S>(mut self, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instruments = instruments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_starting_cash(mut self, cash: f64) -> Self {
        self.starting_cash = cash;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.instruments.is_empty() {
            return Err(OrchestratorError::ConfigError(
                "at least one instrument is required".to_string(),
            ));
        }
        for (i, name) in self.instruments.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(OrchestratorError::ConfigError(format!(
                    "instrument {} has an empty name",
                    i
                )));
            }
            if self.instruments[..i].contains(name) {
                return Err(OrchestratorError::ConfigError(format!(
                    "instrument {} is listed twice",
                    name
                )));
            }
        }
        if !(self.starting_cash >= 0.0) || !self.starting_cash.is_finite() {
            return Err(OrchestratorError::ConfigError(format!(
                "starting_cash must be a finite amount >= 0, got {}",
                self.starting_cash
            )));
        }
        self.strategy
            .validate()
            .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;

        let method: TransformMethod = self.transform.method.parse()?;
        if let TransformMethod::Explicit(plan) = &method {
            if plan.steps.contains(&TransformStep::RollingMean) && self.transform.window == 0 {
                return Err(TransformError::ZeroWindow.into());
            }
        }
        Ok(())
    }
}

/// Mutable per-instrument state carried between cycles
#[derive(Debug, Clone)]
pub struct InstrumentState {
    pub name: String,
    pub window: PriceWindow,
    pub model: RegimeModel,
    pub risk_fraction: f64,
    pub cash_allocation: f64,
    /// Predicted price from the latest market open
    pub last_prediction: Option<f64>,
    /// `last_prediction / price` measured at the latest market open
    pub prediction_ratio: Option<f64>,
    /// `|last_prediction - close|` from the latest after close
    pub last_error: Option<f64>,
    pub last_intent: Option<TradeIntent>,
}

/// Which phase of the day a report describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleKind {
    Initialize,
    MarketOpen,
    AfterClose,
}

/// An instrument that sat out a cycle and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedInstrument {
    pub instrument: String,
    pub reason: String,
}

/// Summary of one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub processed: Vec<String>,
    pub skipped: Vec<SkippedInstrument>,
    /// Signed share orders submitted (market open only)
    pub orders: Vec<(String, i64)>,
    /// Sum of absolute prediction errors (after close only)
    pub total_error: f64,
}

impl CycleReport {
    fn new(kind: CycleKind) -> Self {
        Self {
            kind,
            processed: Vec::new(),
            skipped: Vec::new(),
            orders: Vec::new(),
            total_error: 0.0,
        }
    }

    fn skip(&mut self, instrument: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("{} skipped for {:?}: {}", instrument, self.kind, reason);
        self.skipped.push(SkippedInstrument {
            instrument: instrument.to_string(),
            reason,
        });
    }
}

/// Serializable view of one instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSnapshot {
    pub instrument: String,
    pub last_close: Option<f64>,
    pub risk_fraction: f64,
    pub cash_allocation: f64,
    pub last_prediction: Option<f64>,
    pub prediction_ratio: Option<f64>,
    pub last_error: Option<f64>,
    pub last_decision: Option<Decision>,
    pub regime_means: Vec<f64>,
}

/// Serializable view of the whole engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub market_opens: u64,
    pub after_closes: u64,
    pub instruments: Vec<InstrumentSnapshot>,
}

/// Host collaborators, grouped so they can be borrowed apart from the state
#[derive(Clone)]
pub struct Host {
    pub market: Arc<dyn MarketDataPort>,
    pub portfolio: Arc<dyn PortfolioPort>,
    pub execution: Arc<dyn ExecutionPort>,
}

impl Host {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        portfolio: Arc<dyn PortfolioPort>,
        execution: Arc<dyn ExecutionPort>,
    ) -> Self {
        Self {
            market,
            portfolio,
            execution,
        }
    }

    /// One object serving all three ports, such as the paper market
    pub fn from_shared<H>(host: Arc<H>) -> Self
    where
        H: MarketDataPort + PortfolioPort + ExecutionPort + 'static,
    {
        Self {
            market: host.clone(),
            portfolio: host.clone(),
            execution: host,
        }
    }
}

/// Per-instrument HMM regime trading engine
pub struct Orchestrator {
    config: EngineConfig,
    host: Host,
    states: Vec<InstrumentState>,
    initialized: bool,
    market_opens: u64,
    after_closes: u64,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, host: Host) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            config,
            host,
            states: Vec::new(),
            initialized: false,
            market_opens: 0,
            after_closes: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn states(&self) -> &[InstrumentState] {
        &self.states
    }

    pub fn state(&self, instrument: &str) -> Option<&InstrumentState> {
        self.states.iter().find(|s| s.name == instrument)
    }

    /// Fetch history, train one model per instrument and split the starting
    /// cash evenly. Instruments that fail are dropped; at least one must succeed.
    pub async fn initialize(&mut self) -> Result<CycleReport, OrchestratorError> {
        let mut report = CycleReport::new(CycleKind::Initialize);
        let mut states = Vec::with_capacity(self.config.instruments.len());

        for name in &self.config.instruments {
            match initialize_instrument(&self.host, &self.config, name).await {
                Ok(state) => {
                    report.processed.push(name.clone());
                    states.push(state);
                }
                Err(e) => report.skip(name, e.to_string()),
            }
        }

        if states.is_empty() {
            tracing::error!("Initialization failed for every instrument");
            return Err(OrchestratorError::NoInstruments);
        }

        let allocation = self.config.starting_cash / states.len() as f64;
        for state in &mut states {
            state.cash_allocation = allocation;
        }

        tracing::info!(
            "Initialized {} of {} instruments, {:.2} cash each",
            states.len(),
            self.config.instruments.len(),
            allocation
        );

        self.states = states;
        self.initialized = true;
        Ok(report)
    }

    /// Predict, size and submit one order per instrument with a live quote
    pub async fn market_open(&mut self) -> Result<CycleReport, OrchestratorError> {
        self.ensure_initialized()?;
        let mut report = CycleReport::new(CycleKind::MarketOpen);

        for state in self.states.iter_mut() {
            match open_instrument(&self.host, &self.config.strategy, state).await {
                Ok(Some(shares)) => {
                    report.processed.push(state.name.clone());
                    report.orders.push((state.name.clone(), shares));
                }
                Ok(None) => report.skip(&state.name, "no valid quote"),
                Err(e) => report.skip(&state.name, e.to_string()),
            }
        }

        self.market_opens += 1;
        tracing::info!(
            "Market open #{}: {} orders, {} skipped",
            self.market_opens,
            report.orders.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Slide windows, retrain, adapt risk, then reallocate cash by error share
    pub async fn after_close(&mut self) -> Result<CycleReport, OrchestratorError> {
        self.ensure_initialized()?;
        let mut report = CycleReport::new(CycleKind::AfterClose);
        let mut errors: Vec<(usize, f64)> = Vec::new();

        for (index, state) in self.states.iter_mut().enumerate() {
            match close_instrument(&self.host, &self.config.strategy, state).await {
                Ok(Some(error)) => {
                    report.processed.push(state.name.clone());
                    if let Some(error) = error {
                        errors.push((index, error));
                    }
                }
                Ok(None) => report.skip(&state.name, "no valid close"),
                Err(e) => report.skip(&state.name, e.to_string()),
            }
        }

        report.total_error = errors.iter().map(|(_, e)| e).sum();

        if !errors.is_empty() {
            match self.host.portfolio.cash().await {
                Ok(cash) => self.reallocate(&errors, cash),
                Err(e) => tracing::error!("Cash reallocation skipped: {}", e),
            }
        }

        self.after_closes += 1;
        tracing::info!(
            "After close #{}: {} retrained, total error {:.4}",
            self.after_closes,
            report.processed.len(),
            report.total_error
        );
        Ok(report)
    }

    /// Split portfolio cash across this cycle's participants by error share.
    /// Instruments without an error keep their allocation, which is held out
    /// of the pool.
    fn reallocate(&mut self, errors: &[(usize, f64)], portfolio_cash: f64) {
        let held_out: f64 = self
            .states
            .iter()
            .enumerate()
            .filter(|(i, _)| !errors.iter().any(|(j, _)| j == i))
            .map(|(_, s)| s.cash_allocation)
            .sum();
        let pool = (portfolio_cash - held_out).max(0.0);

        let values: Vec<f64> = errors.iter().map(|(_, e)| *e).collect();
        let allocations = reallocate_cash(&values, pool);

        for ((index, _), allocation) in errors.iter().zip(allocations) {
            if let Some(state) = self.states.get_mut(*index) {
                tracing::debug!(
                    "{} cash allocation {:.2} -> {:.2}",
                    state.name,
                    state.cash_allocation,
                    allocation
                );
                state.cash_allocation = allocation;
            }
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            market_opens: self.market_opens,
            after_closes: self.after_closes,
            instruments: self
                .states
                .iter()
                .map(|s| InstrumentSnapshot {
                    instrument: s.name.clone(),
                    last_close: s.window.last(),
                    risk_fraction: s.risk_fraction,
                    cash_allocation: s.cash_allocation,
                    last_prediction: s.last_prediction,
                    prediction_ratio: s.prediction_ratio,
                    last_error: s.last_error,
                    last_decision: s.last_intent.as_ref().map(|i| i.decision),
                    regime_means: s
                        .model
                        .params()
                        .map(|p| p.means.clone())
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }

    fn ensure_initialized(&self) -> Result<(), OrchestratorError> {
        if self.initialized {
            Ok(())
        } else {
            Err(OrchestratorError::NotInitialized)
        }
    }
}

async fn initialize_instrument(
    host: &Host,
    config: &EngineConfig,
    name: &str,
) -> Result<InstrumentState, OrchestratorError> {
    let lookback = config.strategy.lookback_period;
    let history = host.market.get_history(name, lookback).await?;
    let window = PriceWindow::new(&history, lookback)?;
    let ratios = window.ratios();

    if config.transform.check_ratios {
        log_stationarity(name, &ratios, &config.transform);
    }

    let mut model = RegimeModel::new(config.strategy.model.clone())?;
    let fit = model.train(&ratios)?;
    tracing::debug!(
        "{} trained: {} iterations, log-likelihood {:.4}, converged {}",
        name,
        fit.iterations,
        fit.log_likelihood,
        fit.converged
    );

    Ok(InstrumentState {
        name: name.to_string(),
        window,
        model,
        risk_fraction: config.strategy.risk.initial_risk_fraction,
        cash_allocation: 0.0,
        last_prediction: None,
        prediction_ratio: None,
        last_error: None,
        last_intent: None,
    })
}

fn log_stationarity(name: &str, ratios: &[f64], settings: &TransformSettings) {
    let transformer = StationarityTransformer::new(AdfKpssTest).with_window(settings.window);
    match transformer.transform_str(ratios, &settings.method) {
        Ok(result) if result.tag.is_degraded() => {
            tracing::warn!("{} ratios: no stationary transform found", name)
        }
        Ok(result) => tracing::debug!("{} ratios: stationarity method {}", name, result.tag),
        Err(e) => tracing::warn!("{} ratios: stationarity check failed: {}", name, e),
    }
}

/// Returns the submitted share count, or `None` when the quote is unusable
async fn open_instrument(
    host: &Host,
    strategy: &StrategyConfig,
    state: &mut InstrumentState,
) -> Result<Option<i64>, OrchestratorError> {
    let price = host.market.current_price(&state.name).await?;
    if !is_valid_price(price) {
        return Ok(None);
    }
    let last_close = state.window.last().ok_or(WindowError::TooShort {
        required: 1,
        actual: 0,
    })?;

    let mut observations = state.window.ratios();
    observations.push(price / last_close);
    let inference = state.model.infer(&observations)?;

    if let Some(previous) = state.last_prediction {
        state.prediction_ratio = Some(previous / price);
    }

    let invested = host.portfolio.invested(&state.name).await?;
    let decision = TradeDecision::new(
        &inference,
        price,
        state.cash_allocation,
        state.risk_fraction,
        invested,
        &strategy.decision,
    )?;
    let intent = decision.intent();
    let shares = intent.shares(price);

    tracing::debug!(
        "{} ${:.2} | regime {} (p={:.3}) | predicted ${:.2} | {} {:.2} -> {} shares",
        state.name,
        price,
        inference.regime,
        decision.regime_probability(),
        intent.predicted_price,
        intent.decision,
        intent.amount,
        shares
    );

    state.last_prediction = Some(intent.predicted_price);
    state.last_intent = Some(intent);

    host.execution.submit_order(&state.name, shares).await?;
    Ok(Some(shares))
}

/// Returns `Some(error)` for a processed instrument, where the inner value is
/// `None` when there was no prediction to score; `None` when the close is unusable.
async fn close_instrument(
    host: &Host,
    strategy: &StrategyConfig,
    state: &mut InstrumentState,
) -> Result<Option<Option<f64>>, OrchestratorError> {
    let close = host.market.closing_price(&state.name).await?;
    if !is_valid_price(close) {
        return Ok(None);
    }

    // Commit the slide only once the model has retrained on it
    let mut window = state.window.clone();
    window.slide(close)?;
    let fit = state.model.train(&window.ratios())?;
    state.window = window;
    tracing::debug!(
        "{} retrained on close ${:.2}: {} iterations",
        state.name,
        close,
        fit.iterations
    );

    if let Some(ratio) = state.prediction_ratio.take() {
        let previous = state.risk_fraction;
        state.risk_fraction = strategy.risk.adapt(previous, ratio);
        if state.risk_fraction != previous {
            tracing::info!(
                "{} risk {:.4} -> {:.4} (prediction ratio {:.4})",
                state.name,
                previous,
                state.risk_fraction,
                ratio
            );
        }
    }

    let error = state.last_prediction.map(|p| (p - close).abs());
    state.last_error = error;
    Ok(Some(error))
}
