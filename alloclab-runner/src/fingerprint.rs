//! Content hashes for configs, datasets and run outputs.
//!
//! Two runs with equal `config_hash` and `dataset_hash` must produce equal
//! `result_digest`s; the batch tests lean on that.

use alloclab_core::domain::OrderSide;
use alloclab_core::{BacktestResult, EngineConfig, PriceProvider};

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

/// BLAKE3 over the canonical JSON form of the config.
pub fn config_hash(config: &EngineConfig) -> Result<RunId, serde_json::Error> {
    let json = serde_json::to_string(config)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Hash over every bar in the feed, in symbol then time order.
pub fn dataset_hash(provider: &dyn PriceProvider) -> String {
    let mut hasher = blake3::Hasher::new();
    for symbol in provider.symbols() {
        hasher.update(symbol.as_bytes());
        for bar in provider.series(&symbol) {
            hasher.update(bar.timestamp.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Bit-exact digest of a run's fill log and equity curve.
pub fn result_digest(result: &BacktestResult) -> String {
    let mut hasher = blake3::Hasher::new();
    for fill in &result.fills {
        hasher.update(fill.timestamp.to_string().as_bytes());
        hasher.update(&fill.order_id.0.to_le_bytes());
        hasher.update(&(fill.slice_index as u64).to_le_bytes());
        hasher.update(fill.symbol.as_bytes());
        hasher.update(match fill.side {
            OrderSide::Buy => b"B",
            OrderSide::Sell => b"S",
        });
        hasher.update(&fill.shares.to_le_bytes());
        hasher.update(&fill.price.to_le_bytes());
        hasher.update(&fill.commission.to_le_bytes());
        hasher.update(&fill.slippage.to_le_bytes());
        hasher.update(&fill.cash_after.to_le_bytes());
    }
    hasher.update(b"|equity|");
    for point in &result.equity_curve {
        hasher.update(point.timestamp.to_string().as_bytes());
        hasher.update(&point.total_value.to_le_bytes());
    }
    hasher.update(&(result.warnings.len() as u64).to_le_bytes());
    let status: &[u8] = if result.is_completed() { b"ok" } else { b"failed" };
    hasher.update(status);
    hasher.finalize().to_hex().to_string()
}
