//! Regime Trader - Gaussian HMM regime trading engine
//!
//! Trades a list of instruments once per day on the regime a hidden Markov
//! model infers from recent day-over-day price ratios.
//!
//! # Modules
//!
//! - `domain`: Price windows, trade intents, paper portfolio, cash reallocation
//! - `ports`: Host traits (MarketDataPort, PortfolioPort, ExecutionPort)
//! - `strategy`: Stationarity tests, regime model, trade decisions
//! - `adapters`: Paper market and CLI
//! - `config`: Configuration loading and validation
//! - `application`: Orchestrator, scheduler and paper sessions

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod strategy;
