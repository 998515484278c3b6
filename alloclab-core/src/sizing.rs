//! Sizing: the single place where dollar targets become share quantities.
//!
//! Every share quantity in the engine goes through this module. The sizing
//! policy is passed in explicitly on every call; there is no process-wide flag.
//!
//! Rounding rules:
//! - Buys round DOWN under `Whole` (never overspend cash).
//! - Sells round UP under `Whole` (the remaining position never exceeds its
//!   target value), capped at the shares held.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Share tolerance absorbing float error around integral quantities.
pub const SHARE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingPolicy {
    /// Real-valued share counts.
    #[default]
    Fractional,
    /// Non-negative integer share counts.
    Whole,
}

/// Result of converting a dollar target into shares.
///
/// `shares * price + residual == target_value` within float tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizedQuantity {
    pub shares: f64,
    pub residual: f64,
}

/// Round a raw share count toward zero according to the policy.
pub fn round_shares(raw: f64, policy: SizingPolicy) -> f64 {
    match policy {
        SizingPolicy::Fractional => raw,
        SizingPolicy::Whole => (raw + SHARE_EPSILON).floor(),
    }
}

/// Round a raw share count away from zero according to the policy.
pub fn round_shares_up(raw: f64, policy: SizingPolicy) -> f64 {
    match policy {
        SizingPolicy::Fractional => raw,
        SizingPolicy::Whole => (raw - SHARE_EPSILON).ceil(),
    }
}

/// True if `quantity` is representable under `policy`.
pub fn is_representable(quantity: f64, policy: SizingPolicy) -> bool {
    match policy {
        SizingPolicy::Fractional => quantity.is_finite(),
        SizingPolicy::Whole => quantity.is_finite() && (quantity - quantity.round()).abs() <= SHARE_EPSILON,
    }
}

fn check_price(price: f64) -> Result<(), EngineError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(EngineError::InvalidPrice {
            symbol: String::new(),
            price,
        });
    }
    Ok(())
}

fn check_value(value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::OrderConstraint(format!(
            "target value must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

/// Convert a dollar target into shares and an unspent residual.
///
/// Positions smaller than `min_position_value` are dropped entirely: the
/// whole target comes back as residual.
pub fn calculate_shares(
    target_value: f64,
    price: f64,
    policy: SizingPolicy,
    min_position_value: f64,
) -> Result<SizedQuantity, EngineError> {
    check_price(price)?;
    check_value(target_value)?;

    let mut shares = round_shares(target_value / price, policy);
    let tolerance = SHARE_EPSILON * target_value.max(1.0);
    if policy == SizingPolicy::Whole && shares > 0.0 && shares * price > target_value + tolerance {
        shares -= 1.0;
    }
    if shares > 0.0 && shares * price < min_position_value {
        return Ok(SizedQuantity {
            shares: 0.0,
            residual: target_value,
        });
    }

    let residual = (target_value - shares * price).max(0.0);
    Ok(SizedQuantity { shares, residual })
}

/// Shares to sell to reduce a position by `value` dollars.
///
/// A reduction covering the whole position (within tolerance) always
/// releases every held share, so exits never leave dust behind.
pub fn calculate_release(
    value: f64,
    price: f64,
    held: f64,
    policy: SizingPolicy,
    min_position_value: f64,
) -> Result<f64, EngineError> {
    check_price(price)?;
    check_value(value)?;
    if held <= 0.0 {
        return Ok(0.0);
    }

    let held_value = held * price;
    if value >= held_value - SHARE_EPSILON * held_value.max(1.0) {
        return Ok(held);
    }

    let shares = round_shares_up(value / price, policy).min(held);
    if shares < held && shares * price < min_position_value {
        return Ok(0.0);
    }
    Ok(shares)
}

/// Sizing policy bundled with its dust threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingEngine {
    pub policy: SizingPolicy,
    pub min_position_value: f64,
}

impl SizingEngine {
    pub fn new(policy: SizingPolicy, min_position_value: f64) -> Self {
        Self {
            policy,
            min_position_value,
        }
    }

    pub fn calculate_shares(&self, target_value: f64, price: f64) -> Result<SizedQuantity, EngineError> {
        calculate_shares(target_value, price, self.policy, self.min_position_value)
    }

    pub fn calculate_release(&self, value: f64, price: f64, held: f64) -> Result<f64, EngineError> {
        calculate_release(value, price, held, self.policy, self.min_position_value)
    }

    pub fn round(&self, raw: f64) -> f64 {
        round_shares(raw, self.policy)
    }
}
