//! Synthetic random-walk price feeds.
//!
//! Each symbol gets its own RNG seeded from BLAKE3(symbol, seed), so adding a
//! symbol to a universe never changes the bars of the others.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use alloclab_core::domain::{Bar, BarError};
use alloclab_core::InMemoryFeed;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticFeedConfig {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    /// Inclusive. Weekends are skipped.
    pub end: NaiveDate,
    pub seed: u64,
    pub start_price: f64,
    /// Daily returns are drawn uniformly from `[-max_daily_move, max_daily_move)`.
    pub max_daily_move: f64,
    /// Probability that a bar is replaced by a void (all-NaN) bar.
    pub gap_probability: f64,
}

impl Default for SyntheticFeedConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["SPY".to_string()],
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or_default(),
            seed: 42,
            start_price: 100.0,
            max_daily_move: 0.03,
            gap_probability: 0.0,
        }
    }
}

impl SyntheticFeedConfig {
    pub fn new(symbols: &[&str], start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            start,
            end,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_gap_probability(mut self, p: f64) -> Self {
        self.gap_probability = p;
        self
    }

    /// Builds the in-memory feed for every configured symbol.
    pub fn build(&self) -> Result<InMemoryFeed, BarError> {
        let bars = self
            .symbols
            .iter()
            .flat_map(|symbol| generate_bars(symbol, self));
        InMemoryFeed::from_bars(bars)
    }
}

fn symbol_rng(symbol: &str, seed: u64) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(&seed.to_le_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

/// Random-walk bars for one symbol, one per weekday from `start` to `end`.
pub fn generate_bars(symbol: &str, config: &SyntheticFeedConfig) -> Vec<Bar> {
    let mut rng = symbol_rng(symbol, config.seed);
    let max_move = config.max_daily_move.abs();
    let gap_probability = config.gap_probability.clamp(0.0, 1.0);

    let mut bars = Vec::new();
    let mut price = config.start_price;
    let mut current = config.start;

    while current <= config.end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += Duration::days(1);
            continue;
        }
        let timestamp = current.and_time(NaiveTime::MIN);

        // Draw every value even for void bars so gaps don't shift the walk.
        let daily_return: f64 = if max_move > 0.0 {
            rng.gen_range(-max_move..max_move)
        } else {
            0.0
        };
        let wick_up: f64 = rng.gen_range(0.0..0.01);
        let wick_down: f64 = rng.gen_range(0.0..0.01);
        let volume = rng.gen_range(500_000..5_000_000u64);
        let void = rng.gen::<f64>() < gap_probability;

        let open = price;
        let close = price * (1.0 + daily_return);
        price = close;

        if void {
            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: f64::NAN,
                high: f64::NAN,
                low: f64::NAN,
                close: f64::NAN,
                volume: 0,
            });
        } else {
            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open,
                high: open.max(close) * (1.0 + wick_up),
                low: open.min(close) * (1.0 - wick_down),
                close,
                volume,
            });
        }
        current += Duration::days(1);
    }

    bars
}
