//! Paper trading host
//!
//! Implements every port in memory for simulation and scheduled paper runs.

pub mod market;
pub mod synthetic;

pub use market::{PaperMarket, PaperSnapshot};
pub use synthetic::{generate_paths, SyntheticConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaperError {
    #[error("Failed to read price file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse price file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid paper market: {0}")]
    InvalidConfig(String),
}
