use std::collections::{BTreeMap, BTreeSet};

use super::PriceProvider;
use crate::domain::{Bar, BarError, Timestamp};

/// Bars held in memory, one sorted series per symbol.
///
/// Series are sparse: a symbol with no bar at a calendar timestamp simply
/// has nothing there, and the loop treats that as a data gap.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeed {
    series: BTreeMap<String, Vec<Bar>>,
    calendar: Vec<Timestamp>,
}

impl InMemoryFeed {
    /// Build a feed from bars in any order. Duplicate `(symbol, timestamp)`
    /// pairs are rejected. Void bars are kept as gap markers.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Result<Self, BarError> {
        let mut series: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for bar in bars {
            series.entry(bar.symbol.clone()).or_default().push(bar);
        }

        let mut calendar = BTreeSet::new();
        for bars in series.values_mut() {
            bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
                return Err(BarError::Duplicate {
                    symbol: pair[1].symbol.clone(),
                    timestamp: pair[1].timestamp,
                });
            }
            calendar.extend(bars.iter().map(|b| b.timestamp));
        }

        Ok(Self {
            series,
            calendar: calendar.into_iter().collect(),
        })
    }

    /// Like [`from_bars`](Self::from_bars), but also rejects non-void bars
    /// whose OHLC values are inconsistent.
    pub fn from_bars_checked(bars: impl IntoIterator<Item = Bar>) -> Result<Self, BarError> {
        let bars: Vec<Bar> = bars.into_iter().collect();
        for bar in &bars {
            bar.check()?;
        }
        Self::from_bars(bars)
    }

    /// Restrict decisions to `calendar`, e.g. weekly rebalancing over daily bars.
    /// Timestamps are sorted and deduplicated.
    pub fn with_calendar(mut self, calendar: impl IntoIterator<Item = Timestamp>) -> Self {
        let unique: BTreeSet<Timestamp> = calendar.into_iter().collect();
        self.calendar = unique.into_iter().collect();
        self
    }

    pub fn bar_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl PriceProvider for InMemoryFeed {
    fn calendar(&self) -> &[Timestamp] {
        &self.calendar
    }

    fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    fn series(&self, symbol: &str) -> &[Bar] {
        self.series.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chrono::{Duration, NaiveDate};

    fn ts(day: i64) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap()
            + Duration::days(day)
    }

    fn bar(symbol: &str, day: i64, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            timestamp: ts(day),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn calendar_is_sorted_union() {
        let feed = InMemoryFeed::from_bars(vec![
            bar("B", 2, 10.0),
            bar("A", 0, 100.0),
            bar("A", 2, 101.0),
            bar("B", 1, 11.0),
        ])
        .unwrap();
        assert_eq!(feed.calendar(), &[ts(0), ts(1), ts(2)]);
        assert_eq!(feed.symbols(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(feed.bar_count(), 4);
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = InMemoryFeed::from_bars(vec![bar("A", 0, 1.0), bar("A", 0, 2.0)]).unwrap_err();
        assert!(matches!(err, BarError::Duplicate { .. }));
    }

    #[test]
    fn checked_constructor_rejects_inverted_bars() {
        let mut bad = bar("A", 0, 100.0);
        bad.high = 50.0;
        assert!(InMemoryFeed::from_bars(vec![bad.clone()]).is_ok());
        assert!(matches!(
            InMemoryFeed::from_bars_checked(vec![bad]),
            Err(BarError::Insane { .. })
        ));
    }

    #[test]
    fn missing_bar_is_a_data_gap() {
        let feed = InMemoryFeed::from_bars(vec![bar("A", 0, 100.0), bar("B", 1, 10.0)]).unwrap();
        assert_eq!(feed.get_price("A", ts(0)).unwrap(), 100.0);
        assert!(matches!(
            feed.get_price("A", ts(1)),
            Err(EngineError::DataGap { .. })
        ));
        assert!(feed.get_bar("C", ts(0)).is_none());
    }

    #[test]
    fn history_is_inclusive_and_bounded() {
        let feed = InMemoryFeed::from_bars((0..10).map(|d| bar("A", d, 100.0 + d as f64))).unwrap();
        let hist = feed.get_history("A", ts(5), 3);
        let closes: Vec<f64> = hist.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![103.0, 104.0, 105.0]);
        assert_eq!(feed.bars_before("A", ts(5)).len(), 5);
        assert!(feed.get_history("A", ts(5), 100).len() == 6);
    }

    #[test]
    fn custom_calendar_is_sorted() {
        let feed = InMemoryFeed::from_bars((0..10).map(|d| bar("A", d, 100.0)))
            .unwrap()
            .with_calendar(vec![ts(7), ts(0), ts(7), ts(3)]);
        assert_eq!(feed.calendar(), &[ts(0), ts(3), ts(7)]);
    }
}
