//! Price data: the read-only feed the backtest loop pulls bars from.
//!
//! Fetching, caching and normalizing market data happen outside the engine.
//! A [`PriceProvider`] only has to expose per-symbol series sorted by
//! timestamp plus the decision calendar; lookups are derived from that.

mod feed;

pub use feed::InMemoryFeed;

use crate::domain::{Bar, Timestamp};
use crate::error::EngineError;
use crate::execution::Liquidity;

/// Read-only source of bars. Shared across parallel runs.
pub trait PriceProvider: Send + Sync {
    /// Decision timestamps, strictly increasing.
    fn calendar(&self) -> &[Timestamp];

    /// Symbols the provider has data for, in lexical order.
    fn symbols(&self) -> Vec<String>;

    /// All bars for `symbol`, strictly increasing by timestamp.
    fn series(&self, symbol: &str) -> &[Bar];

    fn get_bar(&self, symbol: &str, at: Timestamp) -> Option<&Bar> {
        let series = self.series(symbol);
        series
            .binary_search_by(|b| b.timestamp.cmp(&at))
            .ok()
            .map(|i| &series[i])
    }

    /// Close at `at`. Missing, void or non-positive closes are a data gap.
    fn get_price(&self, symbol: &str, at: Timestamp) -> Result<f64, EngineError> {
        match self.get_bar(symbol, at) {
            Some(bar) if bar.close.is_finite() && bar.close > 0.0 => Ok(bar.close),
            _ => Err(EngineError::DataGap {
                symbol: symbol.to_string(),
                timestamp: at,
            }),
        }
    }

    /// Up to `lookback` most recent bars with timestamp `<= as_of`.
    fn get_history(&self, symbol: &str, as_of: Timestamp, lookback: usize) -> &[Bar] {
        let series = self.series(symbol);
        let end = series.partition_point(|b| b.timestamp <= as_of);
        &series[end.saturating_sub(lookback)..end]
    }

    /// Every bar with timestamp strictly before `t`.
    fn bars_before(&self, symbol: &str, t: Timestamp) -> &[Bar] {
        let series = self.series(symbol);
        let end = series.partition_point(|b| b.timestamp < t);
        &series[..end]
    }
}

/// Average volume and close-to-close return volatility over `bars`.
///
/// Void or non-positive bars are ignored. Volatility is the sample standard
/// deviation of simple returns between consecutive usable closes.
pub fn estimate_liquidity(bars: &[Bar]) -> Liquidity {
    let usable: Vec<&Bar> = bars.iter().filter(|b| b.is_sane()).collect();
    if usable.is_empty() {
        return Liquidity::default();
    }
    let avg_volume = usable.iter().map(|b| b.volume as f64).sum::<f64>() / usable.len() as f64;

    let returns: Vec<f64> = usable
        .windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect();
    let volatility = if returns.len() < 2 {
        0.0
    } else {
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    };

    Liquidity {
        avg_volume,
        volatility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bar(day: i64, close: f64, volume: u64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap()
            + Duration::days(day);
        Bar {
            symbol: "SPY".into(),
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn flat_prices_have_zero_volatility() {
        let bars: Vec<Bar> = (0..5).map(|d| bar(d, 100.0, 1_000)).collect();
        let liq = estimate_liquidity(&bars);
        assert_eq!(liq.avg_volume, 1_000.0);
        assert_eq!(liq.volatility, 0.0);
    }

    #[test]
    fn volatility_is_sample_stdev_of_returns() {
        // Returns: +10%, -10%
        let bars = vec![bar(0, 100.0, 10), bar(1, 110.0, 20), bar(2, 99.0, 30)];
        let liq = estimate_liquidity(&bars);
        assert_eq!(liq.avg_volume, 20.0);
        let expected = ((0.1_f64 - 0.0).powi(2) + (-0.1_f64 - 0.0).powi(2)).sqrt();
        assert!((liq.volatility - expected).abs() < 1e-9);
    }

    #[test]
    fn void_bars_are_ignored() {
        let mut gap = bar(1, 0.0, 999_999);
        gap.close = f64::NAN;
        let bars = vec![bar(0, 100.0, 10), gap, bar(2, 100.0, 30)];
        let liq = estimate_liquidity(&bars);
        assert_eq!(liq.avg_volume, 20.0);
    }

    #[test]
    fn empty_history_has_unknown_liquidity() {
        assert_eq!(estimate_liquidity(&[]), Liquidity::default());
    }
}
