use serde::{Deserialize, Serialize};

/// Long-only position. Mutated only by the ledger's fill application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub realized_pnl: f64,
}

impl Position {
    pub fn open(symbol: &str, shares: f64, price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            shares,
            avg_cost: price,
            realized_pnl: 0.0,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares * (price - self.avg_cost)
    }

    /// Average into the position.
    pub fn add(&mut self, shares: f64, price: f64) {
        let total = self.shares + shares;
        if total > 0.0 {
            self.avg_cost = (self.avg_cost * self.shares + price * shares) / total;
        }
        self.shares = total;
    }

    /// Reduce the position; cost basis is unchanged. Returns shares actually removed.
    pub fn reduce(&mut self, shares: f64, price: f64) -> f64 {
        let removed = shares.min(self.shares);
        self.realized_pnl += (price - self.avg_cost) * removed;
        self.shares -= removed;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averaging_in_updates_cost_basis() {
        let mut pos = Position::open("SPY", 50.0, 100.0);
        pos.add(50.0, 110.0);
        assert_eq!(pos.shares, 100.0);
        assert!((pos.avg_cost - 105.0).abs() < 1e-10);
    }

    #[test]
    fn reduce_realizes_pnl_and_caps_at_held() {
        let mut pos = Position::open("SPY", 10.0, 100.0);
        let removed = pos.reduce(15.0, 110.0);
        assert_eq!(removed, 10.0);
        assert_eq!(pos.shares, 0.0);
        assert!((pos.realized_pnl - 100.0).abs() < 1e-10);
    }
}
