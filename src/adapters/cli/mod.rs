//! CLI Adapter
//!
//! Command-line interface for the regime trader.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{AnalyzeCmd, CliApp, Command, RunCmd, SimulateCmd};
