//! CLI Commands
//!
//! Argument definitions for the regime trader binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Regime Trader - Gaussian HMM regime trading engine
#[derive(Parser, Debug)]
#[command(
    name = "regime-trader",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Regime-switching trading engine over daily price ratios",
    long_about = "Regime Trader fits a Gaussian hidden Markov model per instrument on its \
                  recent day-over-day price ratios, trades on the predicted regime at market \
                  open and retrains after the close."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the scheduled daily loop against the paper market
    Run(RunCmd),

    /// Replay trading days back to back and print a summary
    Simulate(SimulateCmd),

    /// Stationarity diagnostics and a regime fit for one price series
    Analyze(AnalyzeCmd),
}

/// Start the scheduled loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file (REGIME_TRADER_CONFIG overrides the default)
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Override market open time (HH:MM)
    #[arg(long, value_name = "TIME")]
    pub market_open: Option<String>,

    /// Override after close time (HH:MM)
    #[arg(long, value_name = "TIME")]
    pub after_close: Option<String>,
}

/// Back-to-back simulation
#[derive(Parser, Debug)]
pub struct SimulateCmd {
    /// Path to configuration file (REGIME_TRADER_CONFIG overrides the default)
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Trading days to simulate; stops early when prices run out
    #[arg(short, long, value_name = "DAYS", default_value = "60")]
    pub days: usize,

    /// Override the synthetic price seed
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Analyze one series
#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// JSON file of `{"TICKER": [close, ...]}`
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Ticker to analyze; defaults to the first in the file
    #[arg(short, long, value_name = "TICKER")]
    pub instrument: Option<String>,

    /// Transform method: `auto<d>` or explicit steps such as `ln1`
    #[arg(short, long, value_name = "METHOD", default_value = "auto1")]
    pub method: String,

    /// Rolling mean window for `r` steps
    #[arg(short, long, value_name = "N", default_value = "3")]
    pub window: usize,

    /// Hidden regimes to fit
    #[arg(long, value_name = "K", default_value = "2")]
    pub regimes: usize,

    /// Closing prices to use, most recent last
    #[arg(short, long, value_name = "N", default_value = "30")]
    pub lookback: usize,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulate() {
        let app = CliApp::try_parse_from(["regime-trader", "simulate", "--days", "10", "--json"]).unwrap();
        match app.command {
            Command::Simulate(cmd) => {
                assert_eq!(cmd.days, 10);
                assert!(cmd.json);
                assert_eq!(cmd.config, PathBuf::from("config/default.toml"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_analyze_defaults() {
        let app = CliApp::try_parse_from(["regime-trader", "-v", "analyze", "prices.json"]).unwrap();
        assert!(app.verbose);
        match app.command {
            Command::Analyze(cmd) => {
                assert_eq!(cmd.method, "auto1");
                assert_eq!(cmd.window, 3);
                assert_eq!(cmd.regimes, 2);
                assert!(cmd.instrument.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_overrides() {
        let app = CliApp::try_parse_from([
            "regime-trader",
            "run",
            "--market-open",
            "09:30",
            "--debug",
        ])
        .unwrap();
        assert!(app.debug);
        match app.command {
            Command::Run(cmd) => assert_eq!(cmd.market_open.as_deref(), Some("09:30")),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
