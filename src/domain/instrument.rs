use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("Price window needs {required} closes, got {actual}")]
    TooShort { required: usize, actual: usize },

    #[error("Price {value} at position {index} is not a positive finite number")]
    InvalidPrice { index: usize, value: f64 },
}

/// Fixed-length window of positive closing prices, oldest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceWindow {
    prices: VecDeque<f64>,
}

impl PriceWindow {
    /// Build a window from the most recent `lookback` prices of `history`
    pub fn new(history: &[f64], lookback: usize) -> Result<Self, WindowError> {
        if lookback < 2 || history.len() < lookback {
            return Err(WindowError::TooShort {
                required: lookback.max(2),
                actual: history.len(),
            });
        }

        let recent = &history[history.len() - lookback..];
        if let Some((index, &value)) = recent
            .iter()
            .enumerate()
            .find(|(_, p)| !is_valid_price(**p))
        {
            return Err(WindowError::InvalidPrice { index, value });
        }

        Ok(Self {
            prices: recent.iter().copied().collect(),
        })
    }

    /// Drop the oldest close and append `close`; length is unchanged
    pub fn slide(&mut self, close: f64) -> Result<(), WindowError> {
        if !is_valid_price(close) {
            return Err(WindowError::InvalidPrice {
                index: self.prices.len(),
                value: close,
            });
        }
        self.prices.pop_front();
        self.prices.push_back(close);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.prices.iter().copied().collect()
    }

    /// `price[i] / price[i-1]` over the window
    pub fn ratios(&self) -> Vec<f64> {
        trend_ratios(self.to_vec())
    }
}

/// Ratios of consecutive prices; one shorter than the input
pub fn trend_ratios<P: AsRef<[f64]>>(prices: P) -> Vec<f64> {
    prices
        .as_ref()
        .windows(2)
        .map(|pair| pair[1] / pair[0])
        .collect()
}

pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}
