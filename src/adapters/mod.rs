//! Adapters Layer - External System Implementations
//!
//! - Paper: in-memory market implementing every host port
//! - CLI: Command-line interface definitions

pub mod cli;
pub mod paper;

pub use cli::CliApp;
pub use paper::{PaperMarket, SyntheticConfig};
