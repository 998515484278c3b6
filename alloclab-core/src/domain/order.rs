//! Parent orders and their lifecycle.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::ids::OrderId;
use super::Timestamp;
use crate::error::EngineError;
use crate::execution::ExecutionAlgorithm;

/// Quantity tolerance when comparing filled against requested shares.
const FILL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

/// Order lifecycle states.
///
/// `Pending → PartiallyFilled → Filled`, or `Pending | PartiallyFilled → Cancelled`.
/// Filled and Cancelled are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled { reason: String },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled { .. })
    }
}

/// Virtual execution window the slices of an order are scheduled across.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes.max(0)),
        }
    }

    /// Zero-length window: every slice is scheduled at `at`.
    pub fn instant(at: Timestamp) -> Self {
        Self { start: at, end: at }
    }

    /// Shorten the window so it ends no later than `limit`.
    pub fn ending_by(self, limit: Timestamp) -> Self {
        Self {
            start: self.start,
            end: self.end.min(limit).max(self.start),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Timestamp of slot `index` out of `count` evenly spaced slots.
    pub fn slot(&self, index: usize, count: usize) -> Timestamp {
        if count <= 1 {
            return self.start;
        }
        let step = self.duration() / count as i32;
        self.start + step * index as i32
    }
}

/// A parent order created at a rebalance decision point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    /// Dollar value the rebalance asked for.
    pub requested_value: f64,
    /// Share quantity after sizing.
    pub quantity: f64,
    pub filled_quantity: f64,
    pub algorithm: ExecutionAlgorithm,
    pub window: TimeWindow,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(
        id: OrderId,
        symbol: &str,
        side: OrderSide,
        requested_value: f64,
        quantity: f64,
        algorithm: ExecutionAlgorithm,
        window: TimeWindow,
    ) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            side,
            requested_value,
            quantity,
            filled_quantity: 0.0,
            algorithm,
            window,
            status: OrderStatus::Pending,
        }
    }

    pub fn remaining_quantity(&self) -> f64 {
        self.quantity - self.filled_quantity
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Record a slice fill. Overfills and fills on terminal orders are rejected.
    pub fn record_fill(&mut self, quantity: f64) -> Result<(), EngineError> {
        if !self.is_active() {
            return Err(EngineError::OrderConstraint(format!(
                "{}: fill on terminal order ({:?})",
                self.id, self.status
            )));
        }
        if quantity > self.remaining_quantity() + FILL_EPSILON {
            return Err(EngineError::OrderConstraint(format!(
                "{}: fill of {quantity} exceeds remaining {}",
                self.id,
                self.remaining_quantity()
            )));
        }
        self.filled_quantity += quantity;
        self.status = if self.remaining_quantity() <= FILL_EPSILON {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.is_active() {
            self.status = OrderStatus::Cancelled {
                reason: reason.into(),
            };
        }
    }
}
