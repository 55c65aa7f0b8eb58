//! Fine-to-coarse bar aggregation.
//!
//! A bucket accumulates fine bars for one coarse interval: open = first
//! fine open, high/low = extremes, close = last fine close, volume = sum.
//! FX payloads keep the last spread and sum the volumes and swap.

use crate::domain::{Bar, BarExt};
use chrono::{DateTime, Utc};

/// An in-progress coarse bar. Flushed into the coarse timeframe only once
/// a fine bar from a later bucket arrives, so a coarse bar exists only
/// when it is complete.
#[derive(Debug, Clone)]
pub(crate) struct BarBucket {
    pub start: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    ext: BarExt,
}

impl BarBucket {
    pub fn open_at(start: DateTime<Utc>, bar: &Bar) -> Self {
        Self {
            start,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            ext: bar.ext.clone(),
        }
    }

    pub fn absorb(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume += bar.volume;
        merge_ext(&mut self.ext, &bar.ext);
    }

    pub fn into_bar(self) -> Bar {
        Bar {
            timestamp: self.start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            ext: self.ext,
        }
    }
}

fn merge_ext(acc: &mut BarExt, incoming: &BarExt) {
    match (acc, incoming) {
        (BarExt::Fx(acc), BarExt::Fx(new)) => {
            acc.spread = new.spread;
            acc.tick_volume += new.tick_volume;
            acc.trade_volume += new.trade_volume;
            acc.swap += new.swap;
        }
        (acc @ BarExt::None, ext @ BarExt::Fx(_)) => *acc = ext.clone(),
        (_, BarExt::None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FxFields;
    use chrono::{Duration, TimeZone, Utc};

    fn fx_bar(minute: i64, open: f64, high: f64, low: f64, close: f64, tick: f64) -> Bar {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        Bar {
            timestamp: base + Duration::minutes(minute),
            open,
            high,
            low,
            close,
            volume: tick,
            ext: BarExt::Fx(FxFields {
                spread: 0.0001 * (minute + 1) as f64,
                tick_volume: tick,
                trade_volume: tick / 2.0,
                swap: 0.01,
            }),
        }
    }

    #[test]
    fn bucket_aggregates_ohlcv() {
        let first = fx_bar(0, 1.10, 1.12, 1.09, 1.11, 100.0);
        let second = fx_bar(1, 1.11, 1.15, 1.10, 1.14, 50.0);
        let third = fx_bar(2, 1.14, 1.14, 1.05, 1.06, 25.0);

        let mut bucket = BarBucket::open_at(first.timestamp, &first);
        bucket.absorb(&second);
        bucket.absorb(&third);
        let bar = bucket.into_bar();

        assert_eq!(bar.open, 1.10);
        assert_eq!(bar.high, 1.15);
        assert_eq!(bar.low, 1.05);
        assert_eq!(bar.close, 1.06);
        assert_eq!(bar.volume, 175.0);
    }

    #[test]
    fn fx_payload_merges() {
        let first = fx_bar(0, 1.10, 1.12, 1.09, 1.11, 100.0);
        let second = fx_bar(1, 1.11, 1.15, 1.10, 1.14, 50.0);

        let mut bucket = BarBucket::open_at(first.timestamp, &first);
        bucket.absorb(&second);
        let bar = bucket.into_bar();
        let fx = bar.fx().unwrap();

        // spread: last wins; volumes and swap accumulate
        assert!((fx.spread - 0.0002).abs() < 1e-12);
        assert_eq!(fx.tick_volume, 150.0);
        assert_eq!(fx.trade_volume, 75.0);
        assert!((fx.swap - 0.02).abs() < 1e-12);
    }
}
