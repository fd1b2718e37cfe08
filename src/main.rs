//! Regime Trader - Gaussian HMM regime trading engine
//!
//! Runs the daily regime trading loop against the paper market.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use regime_trader::adapters::cli::{AnalyzeCmd, CliApp, Command, RunCmd, SimulateCmd};
use regime_trader::adapters::paper::PaperMarket;
use regime_trader::application::{
    DailySchedule, EngineConfig, PaperSession, Scheduler, SimulationSummary,
};
use regime_trader::config::{load_config, resolve_config_path, Config};
use regime_trader::domain::PriceWindow;
use regime_trader::strategy::regime::{RegimeInference, RegimeModel, RegimeModelConfig};
use regime_trader::strategy::stationarity::{adf_test, kpss_test, StationarityTransformer};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Simulate(cmd) => simulate_command(cmd, app.verbose, app.debug).await,
        Command::Analyze(cmd) => {
            init_logging(None, app.verbose, app.debug)?;
            analyze_command(cmd)
        }
    }
}

/// RUST_LOG wins, then the CLI flags, then the config level
fn init_logging(config_level: Option<&str>, verbose: bool, debug: bool) -> Result<()> {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        config_level.unwrap_or("warn")
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn load(path: &Path) -> Result<Config> {
    let path = resolve_config_path(path);
    load_config(&path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Paper market from the configured price file, or seeded synthetic paths
fn build_market(config: &Config, seed: Option<u64>) -> Result<PaperMarket> {
    let start_day = config.engine.lookback_period;
    let cash = config.engine.starting_cash;

    let market = match config.paper.price_file_path()? {
        Some(path) => PaperMarket::from_json_file(&path, cash, start_day)
            .with_context(|| format!("Failed to load prices from {}", path.display()))?,
        None => {
            let mut synthetic = config.paper.synthetic();
            if let Some(seed) = seed {
                synthetic = synthetic.with_seed(seed);
            }
            PaperMarket::synthetic(&config.engine.instruments, &synthetic, cash, start_day)
                .context("Failed to generate synthetic prices")?
        }
    };
    Ok(market)
}

async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config)?;
    init_logging(Some(&config.logging.level), verbose, debug)?;
    tracing::info!("Starting regime trader...");

    let mut schedule_section = config.schedule.clone();
    if let Some(open) = cmd.market_open {
        schedule_section.market_open = open;
    }
    if let Some(close) = cmd.after_close {
        schedule_section.after_close = close;
    }
    let schedule: DailySchedule = schedule_section.to_schedule()?;

    let market = Arc::new(build_market(&config, None)?);
    let mut session = PaperSession::new(EngineConfig::from(&config), market)
        .context("Failed to create orchestrator")?;
    let report = session.initialize().await.context("Initialization failed")?;
    tracing::info!(
        "Initialized {} instruments ({} skipped)",
        report.processed.len(),
        report.skipped.len()
    );

    let scheduler = Arc::new(
        Scheduler::new(schedule)
            .with_poll_interval(Duration::from_secs(config.schedule.poll_interval_secs)),
    );

    // Setup Ctrl+C handler
    let stopper = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        stopper.stop().await;
    });

    tracing::warn!("PAPER TRADING MODE - orders fill against the in-memory market");
    scheduler.run(&mut session).await;

    print_summary(&session.summary().await, false)?;
    tracing::info!("Regime trader stopped");
    Ok(())
}

async fn simulate_command(cmd: SimulateCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config)?;
    init_logging(Some(&config.logging.level), verbose, debug)?;

    let market = Arc::new(build_market(&config, cmd.seed)?);
    let mut session = PaperSession::new(EngineConfig::from(&config), market)
        .context("Failed to create orchestrator")?;

    let summary = session.simulate(cmd.days).await.context("Simulation failed")?;
    print_summary(&summary, cmd.json)
}

fn print_summary(summary: &SimulationSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Simulation Summary");
    println!("  Days: {}", summary.days_simulated);
    println!("  Starting cash: {:.2}", summary.starting_cash);
    println!("  Final equity: {:.2}", summary.final_equity);
    println!("  Return: {:+.2}%", summary.return_pct);
    println!("  Unrealized P&L: {:+.2}", summary.account.unrealized_pnl);
    println!("  Orders: {}", summary.orders_submitted);
    println!("  Skipped instrument cycles: {}", summary.skipped_instrument_cycles);
    println!();
    for inst in &summary.engine.instruments {
        let shares = summary.account.positions.get(&inst.instrument).copied().unwrap_or(0);
        println!(
            "  {:<8} risk {:.4}  cash {:>12.2}  shares {:>8}  last error {}",
            inst.instrument,
            inst.risk_fraction,
            inst.cash_allocation,
            shares,
            inst.last_error
                .map(|e| format!("{:.4}", e))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    instrument: String,
    observations: usize,
    adf_statistic: f64,
    adf_critical: f64,
    kpss_statistic: f64,
    kpss_critical: f64,
    stationary: bool,
    transform: String,
    transformed_len: usize,
    fit_iterations: usize,
    log_likelihood: f64,
    regime_means: Vec<f64>,
    inference: RegimeInference,
    predicted_price: f64,
}

fn analyze_command(cmd: AnalyzeCmd) -> Result<()> {
    let content = std::fs::read_to_string(&cmd.file)
        .with_context(|| format!("Failed to read {}", cmd.file.display()))?;
    let paths: BTreeMap<String, Vec<f64>> =
        serde_json::from_str(&content).context("Expected {\"TICKER\": [close, ...]}")?;

    let (instrument, closes) = match &cmd.instrument {
        Some(name) => match paths.get(name) {
            Some(closes) => (name.clone(), closes),
            None => bail!("{} not found in {}", name, cmd.file.display()),
        },
        None => match paths.iter().next() {
            Some((name, closes)) => (name.clone(), closes),
            None => bail!("{} contains no instruments", cmd.file.display()),
        },
    };

    let window = PriceWindow::new(closes, cmd.lookback)?;
    let ratios = window.ratios();
    let last_close = window.last().context("Empty price window")?;

    let adf = adf_test(&ratios)?;
    let kpss = kpss_test(&ratios)?;
    let transformed = StationarityTransformer::default()
        .with_window(cmd.window)
        .transform_str(&ratios, &cmd.method)?;

    let mut model = RegimeModel::new(RegimeModelConfig::default().with_regimes(cmd.regimes))?;
    let fit = model.train(&ratios)?;
    let inference = model.infer(&ratios)?;
    let regime_means = model.params().map(|p| p.means.clone()).unwrap_or_default();

    let report = AnalysisReport {
        instrument,
        observations: ratios.len(),
        adf_statistic: adf.statistic,
        adf_critical: adf.critical_value,
        kpss_statistic: kpss.statistic,
        kpss_critical: kpss.critical_value,
        stationary: adf.is_stationary() && kpss.is_stationary(),
        transform: transformed.tag.to_string(),
        transformed_len: transformed.series.len(),
        fit_iterations: fit.iterations,
        log_likelihood: fit.log_likelihood,
        regime_means,
        predicted_price: last_close * inference.mean,
        inference,
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Analysis for {} ({} ratios)", report.instrument, report.observations);
    println!("  ADF:  {:.4} (1% critical {:.4})", report.adf_statistic, report.adf_critical);
    println!("  KPSS: {:.4} (1% critical {:.4})", report.kpss_statistic, report.kpss_critical);
    println!("  Stationary: {}", report.stationary);
    println!("  Transform ({}): {} -> {} values", cmd.method, report.transform, report.transformed_len);
    println!(
        "  HMM fit: {} iterations, log-likelihood {:.4}",
        report.fit_iterations, report.log_likelihood
    );
    for (regime, mean) in report.regime_means.iter().enumerate() {
        println!("    regime {}: mean ratio {:.5}", regime, mean);
    }
    println!(
        "  Current regime {} (persistence {:.3}), predicted next price {:.4}",
        report.inference.regime,
        report.inference.persistence().unwrap_or(f64::NAN),
        report.predicted_price
    );
    Ok(())
}
