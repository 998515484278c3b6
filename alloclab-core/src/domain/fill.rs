use serde::{Deserialize, Serialize};

use super::ids::OrderId;
use super::order::OrderSide;
use super::Timestamp;

/// Fill log entry. Written once by the ledger, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub timestamp: Timestamp,
    pub order_id: OrderId,
    pub slice_index: usize,
    pub symbol: String,
    pub side: OrderSide,
    pub shares: f64,
    pub price: f64,
    pub commission: f64,
    /// Slippage in dollars, charged to cash.
    pub slippage: f64,
    /// Cash balance immediately after this fill.
    pub cash_after: f64,
}

impl FillRecord {
    pub fn gross_amount(&self) -> f64 {
        self.shares * self.price
    }

    pub fn total_cost(&self) -> f64 {
        self.commission + self.slippage
    }

    /// Signed cash delta: buys pay gross + costs, sells receive gross - costs.
    pub fn cash_delta(&self) -> f64 {
        match self.side {
            OrderSide::Buy => -(self.gross_amount() + self.total_cost()),
            OrderSide::Sell => self.gross_amount() - self.total_cost(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fill(side: OrderSide) -> FillRecord {
        FillRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            order_id: OrderId(1),
            slice_index: 0,
            symbol: "SPY".into(),
            side,
            shares: 50.0,
            price: 100.0,
            commission: 5.0,
            slippage: 2.0,
            cash_after: 0.0,
        }
    }

    #[test]
    fn costs_always_reduce_cash() {
        assert_eq!(fill(OrderSide::Buy).cash_delta(), -5_007.0);
        assert_eq!(fill(OrderSide::Sell).cash_delta(), 4_993.0);
    }
}
