use serde::Serialize;
use std::collections::HashMap;

use super::trade::OrderRecord;

/// Shares held in one instrument, with the average cost of the position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub instrument: String,
    pub shares: i64,
    pub average_cost: f64,
    pub last_price: f64,
}

impl Holding {
    pub fn new(instrument: String, shares: i64, price: f64) -> Self {
        Holding {
            instrument,
            shares,
            average_cost: price,
            last_price: price,
        }
    }

    pub fn update_price(&mut self, price: f64) {
        self.last_price = price;
    }

    pub fn market_value(&self) -> f64 {
        self.shares as f64 * self.last_price
    }

    pub fn pnl(&self) -> f64 {
        (self.last_price - self.average_cost) * self.shares as f64
    }
}

/// Cash plus share positions, filled at a quoted price
#[derive(Debug, Clone, Default, Serialize)]
pub struct Portfolio {
    pub cash: f64,
    pub holdings: HashMap<String, Holding>,
}

impl Portfolio {
    pub fn new(cash: f64) -> Self {
        Portfolio {
            cash,
            holdings: HashMap::new(),
        }
    }

    pub fn is_invested(&self, instrument: &str) -> bool {
        self.holdings
            .get(instrument)
            .map_or(false, |h| h.shares > 0)
    }

    pub fn shares(&self, instrument: &str) -> i64 {
        self.holdings.get(instrument).map_or(0, |h| h.shares)
    }

    /// Fill a signed order at `price`. Buys are capped at affordable shares,
    /// sells at the held position. Returns the record of what actually filled.
    pub fn fill(&mut self, instrument: &str, requested: i64, price: f64) -> OrderRecord {
        let filled = if !(price > 0.0) {
            0
        } else if requested > 0 {
            requested.min((self.cash / price).floor() as i64)
        } else {
            requested.max(-self.shares(instrument))
        };

        if filled != 0 {
            let holding = self
                .holdings
                .entry(instrument.to_string())
                .or_insert_with(|| Holding::new(instrument.to_string(), 0, price));

            if filled > 0 {
                let total = holding.shares + filled;
                holding.average_cost = (holding.average_cost * holding.shares as f64
                    + price * filled as f64)
                    / total as f64;
                holding.shares = total;
            } else {
                holding.shares += filled;
            }
            holding.update_price(price);

            if holding.shares == 0 {
                self.holdings.remove(instrument);
            }
        }

        let record = OrderRecord::new(instrument, filled, Some(price));
        self.cash += record.cash_delta();
        record
    }

    pub fn update_holding_price(&mut self, instrument: &str, price: f64) -> bool {
        match self.holdings.get_mut(instrument) {
            Some(holding) => {
                holding.update_price(price);
                true
            }
            None => false,
        }
    }

    /// Cash plus the marked value of all positions
    pub fn equity(&self) -> f64 {
        self.cash + self.holdings.values().map(Holding::market_value).sum::<f64>()
    }

    /// Unrealized P&L of open positions against their average cost
    pub fn total_pnl(&self) -> f64 {
        self.holdings.values().map(|h| h.pnl()).sum()
    }
}
