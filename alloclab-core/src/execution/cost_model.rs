//! Transaction cost model: commission and slippage.
//!
//! Both are charged against cash at fill time. The traded quantity is never
//! reduced to pay for costs, and every cost is clamped to be non-negative.

use serde::{Deserialize, Serialize};

/// Slippage model, expressed in basis points of traded notional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlippageModel {
    /// Constant cost regardless of size.
    Fixed { bps: f64 },
    /// `coefficient_bps × participation`.
    Linear { coefficient_bps: f64 },
    /// `coefficient × volatility × sqrt(participation)`, in return units
    /// converted to bps. Grows sub-linearly with order size.
    Sqrt { coefficient: f64 },
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::Fixed { bps: 0.0 }
    }
}

impl SlippageModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Linear { .. } => "linear",
            Self::Sqrt { .. } => "sqrt",
        }
    }

    fn depends_on_volume(&self) -> bool {
        !matches!(self, Self::Fixed { .. })
    }
}

/// Liquidity inputs for a single symbol, estimated from visible history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Liquidity {
    pub avg_volume: f64,
    /// Standard deviation of close-to-close returns.
    pub volatility: f64,
}

/// Dollar costs of a single fill.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TradeCost {
    pub commission: f64,
    pub slippage: f64,
}

impl TradeCost {
    pub fn total(&self) -> f64 {
        self.commission + self.slippage
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCostModel {
    /// Flat fee per fill.
    pub commission_fixed: f64,
    /// Fraction of traded notional.
    pub commission_pct: f64,
    /// Dollars per share traded.
    pub commission_per_share: f64,
    pub slippage: SlippageModel,
    /// Ceiling applied to every slippage model.
    pub max_slippage_bps: f64,
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        Self::frictionless()
    }
}

impl TransactionCostModel {
    pub fn frictionless() -> Self {
        Self {
            commission_fixed: 0.0,
            commission_pct: 0.0,
            commission_per_share: 0.0,
            slippage: SlippageModel::Fixed { bps: 0.0 },
            max_slippage_bps: 0.0,
        }
    }

    /// Retail-equity defaults: $1 per fill, 5 bps commission, sqrt impact
    /// capped at 50 bps.
    pub fn realistic() -> Self {
        Self {
            commission_fixed: 1.0,
            commission_pct: 0.0005,
            commission_per_share: 0.0,
            slippage: SlippageModel::Sqrt { coefficient: 1.0 },
            max_slippage_bps: 50.0,
        }
    }

    /// Commission for a fill of `shares` at `price`. Zero shares cost nothing.
    pub fn commission(&self, shares: f64, price: f64) -> f64 {
        if shares <= 0.0 {
            return 0.0;
        }
        let cost = self.commission_fixed
            + self.commission_pct * shares * price
            + self.commission_per_share * shares;
        cost.max(0.0)
    }

    /// Slippage in basis points, clamped to `[0, max_slippage_bps]`.
    ///
    /// Unknown liquidity (`avg_volume <= 0`) is charged the ceiling by the
    /// volume-dependent models.
    pub fn slippage_bps(&self, order_size: f64, avg_volume: f64, volatility: f64) -> f64 {
        if order_size <= 0.0 {
            return 0.0;
        }
        if self.slippage.depends_on_volume() && avg_volume <= 0.0 {
            return self.max_slippage_bps.max(0.0);
        }

        let raw = match &self.slippage {
            SlippageModel::Fixed { bps } => *bps,
            SlippageModel::Linear { coefficient_bps } => {
                coefficient_bps * (order_size / avg_volume)
            }
            SlippageModel::Sqrt { coefficient } => {
                coefficient * volatility.max(0.0) * (order_size / avg_volume).sqrt() * 10_000.0
            }
        };
        if raw.is_nan() {
            return self.max_slippage_bps.max(0.0);
        }
        raw.clamp(0.0, self.max_slippage_bps.max(0.0))
    }

    /// Slippage in dollars for a fill.
    pub fn slippage_cost(&self, shares: f64, price: f64, liquidity: &Liquidity) -> f64 {
        let bps = self.slippage_bps(shares, liquidity.avg_volume, liquidity.volatility);
        bps / 10_000.0 * shares * price
    }

    pub fn estimate(&self, shares: f64, price: f64, liquidity: &Liquidity) -> TradeCost {
        TradeCost {
            commission: self.commission(shares, price),
            slippage: self.slippage_cost(shares, price, liquidity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(slippage: SlippageModel) -> TransactionCostModel {
        TransactionCostModel {
            slippage,
            max_slippage_bps: 100.0,
            ..TransactionCostModel::frictionless()
        }
    }

    #[test]
    fn frictionless_costs_nothing() {
        let cost = TransactionCostModel::frictionless();
        let liq = Liquidity {
            avg_volume: 1_000.0,
            volatility: 0.02,
        };
        assert_eq!(cost.estimate(100.0, 50.0, &liq), TradeCost::default());
    }

    #[test]
    fn commission_is_fixed_plus_proportional() {
        let cost = TransactionCostModel {
            commission_fixed: 1.0,
            commission_pct: 0.001,
            commission_per_share: 0.01,
            ..TransactionCostModel::frictionless()
        };
        // 1 + 0.001 * 100 * 50 + 0.01 * 100 = 1 + 5 + 1
        assert!((cost.commission(100.0, 50.0) - 7.0).abs() < 1e-10);
        assert_eq!(cost.commission(0.0, 50.0), 0.0);
    }

    #[test]
    fn negative_commission_settings_clamp_to_zero() {
        let cost = TransactionCostModel {
            commission_fixed: -10.0,
            ..TransactionCostModel::frictionless()
        };
        assert_eq!(cost.commission(1.0, 1.0), 0.0);
    }

    #[test]
    fn fixed_slippage_ignores_size() {
        let cost = model(SlippageModel::Fixed { bps: 5.0 });
        assert_eq!(cost.slippage_bps(10.0, 1_000.0, 0.0), 5.0);
        assert_eq!(cost.slippage_bps(900.0, 1_000.0, 0.0), 5.0);
    }

    #[test]
    fn linear_slippage_scales_with_participation() {
        let cost = model(SlippageModel::Linear {
            coefficient_bps: 50.0,
        });
        // 10% participation → 5 bps
        assert!((cost.slippage_bps(100.0, 1_000.0, 0.0) - 5.0).abs() < 1e-10);
        // 20% participation → 10 bps
        assert!((cost.slippage_bps(200.0, 1_000.0, 0.0) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn sqrt_slippage_grows_sub_linearly() {
        let cost = model(SlippageModel::Sqrt { coefficient: 0.5 });
        let small = cost.slippage_bps(10.0, 10_000.0, 0.02);
        let large = cost.slippage_bps(40.0, 10_000.0, 0.02);
        // 4x size → 2x impact
        assert!((large / small - 2.0).abs() < 1e-9);
        // 0.5 * 0.02 * sqrt(0.001) * 10_000
        assert!((small - 0.5 * 0.02 * 0.001_f64.sqrt() * 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn all_models_clamp_to_ceiling() {
        for slippage in [
            SlippageModel::Fixed { bps: 500.0 },
            SlippageModel::Linear {
                coefficient_bps: 10_000.0,
            },
            SlippageModel::Sqrt { coefficient: 50.0 },
        ] {
            let cost = model(slippage);
            assert_eq!(cost.slippage_bps(5_000.0, 1_000.0, 0.5), 100.0);
        }
    }

    #[test]
    fn unknown_volume_charges_the_ceiling() {
        let cost = model(SlippageModel::Linear {
            coefficient_bps: 1.0,
        });
        assert_eq!(cost.slippage_bps(10.0, 0.0, 0.01), 100.0);
    }

    #[test]
    fn slippage_cost_is_bps_of_notional() {
        let cost = model(SlippageModel::Fixed { bps: 10.0 });
        let dollars = cost.slippage_cost(100.0, 100.0, &Liquidity::default());
        // 10 bps of $10,000
        assert!((dollars - 10.0).abs() < 1e-10);
    }
}
