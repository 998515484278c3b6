//! Domain types: bars, orders, slices, positions, fills, portfolio state.

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod slice;

pub use bar::{Bar, BarError};
pub use fill::FillRecord;
pub use ids::{IdGen, OrderId};
pub use order::{Order, OrderSide, OrderStatus, TimeWindow};
pub use portfolio::{EquityPoint, PortfolioState};
pub use position::Position;
pub use slice::ExecutionSlice;

/// Symbol type alias
pub type Symbol = String;

/// Decision timestamps are naive: the engine has no notion of time zones.
pub type Timestamp = chrono::NaiveDateTime;

/// Target allocation as a fraction of equity per symbol. Ordered by symbol.
pub type TargetWeights = std::collections::BTreeMap<String, f64>;
