use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-way trading decision, computed once per instrument per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => write!(f, "BUY"),
            Decision::Sell => write!(f, "SELL"),
            Decision::Hold => write!(f, "HOLD"),
        }
    }
}

/// What the decision engine wants done for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    /// Next-step price implied by the regime mean
    pub predicted_price: f64,
    pub decision: Decision,
    /// Capital committed, `0 <= amount <= cash`
    pub amount: f64,
}

impl TradeIntent {
    /// Signed share count for an order at `price`: positive buys, negative sells.
    /// Both sides floor the signed quantity, so a partial sell share rounds up
    /// to a whole one. A zero or invalid price yields 0.
    pub fn shares(&self, price: f64) -> i64 {
        if !(price > 0.0) || !self.amount.is_finite() {
            return 0;
        }
        match self.decision {
            Decision::Buy => (self.amount / price).floor() as i64,
            Decision::Sell => (-self.amount / price).floor() as i64,
            Decision::Hold => 0,
        }
    }
}

/// An order as submitted to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub instrument: String,
    /// Positive buys, negative sells
    pub shares: i64,
    /// Fill price, if the host reported one
    pub price: Option<f64>,
    pub timestamp: u64,
}

impl OrderRecord {
    pub fn new(instrument: impl Into<String>, shares: i64, price: Option<f64>) -> Self {
        Self {
            instrument: instrument.into(),
            shares,
            price,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    /// Cash moved by the fill; negative for buys
    pub fn cash_delta(&self) -> f64 {
        self.price.map_or(0.0, |p| -(self.shares as f64) * p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(decision: Decision, amount: f64) -> TradeIntent {
        TradeIntent {
            predicted_price: 100.0,
            decision,
            amount,
        }
    }

    #[test]
    fn test_buy_shares_floor() {
        assert_eq!(intent(Decision::Buy, 50.0).shares(30.0), 1);
        assert_eq!(intent(Decision::Buy, 50.0).shares(100.0), 0);
        assert_eq!(intent(Decision::Buy, 250.0).shares(50.0), 5);
    }

    #[test]
    fn test_sell_shares_negative() {
        assert_eq!(intent(Decision::Sell, 250.0).shares(50.0), -5);
        assert_eq!(intent(Decision::Sell, 70.0).shares(50.0), -2);
    }

    #[test]
    fn test_sell_partial_share_rounds_away_from_zero() {
        assert_eq!(intent(Decision::Sell, 25.0).shares(10.0), -3);
        assert_eq!(intent(Decision::Sell, 5.0).shares(10.0), -1);
        assert_eq!(intent(Decision::Sell, 0.0).shares(10.0), 0);
    }

    #[test]
    fn test_hold_and_invalid_price() {
        assert_eq!(intent(Decision::Hold, 500.0).shares(50.0), 0);
        assert_eq!(intent(Decision::Buy, 500.0).shares(0.0), 0);
        assert_eq!(intent(Decision::Buy, 500.0).shares(f64::NAN), 0);
    }

    #[test]
    fn test_order_cash_delta() {
        let buy = OrderRecord::new("AAPL", 3, Some(10.0));
        assert_eq!(buy.cash_delta(), -30.0);

        let sell = OrderRecord::new("AAPL", -2, Some(10.0));
        assert_eq!(sell.cash_delta(), 20.0);

        assert_eq!(OrderRecord::new("AAPL", 2, None).cash_delta(), 0.0);
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::Buy.to_string(), "BUY");
        assert_eq!(Decision::Hold.to_string(), "HOLD");
    }
}
