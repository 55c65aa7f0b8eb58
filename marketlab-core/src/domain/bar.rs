//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol over one sampling interval.
///
/// `timestamp` is the open time of the interval and is the bar's identity:
/// within one timeframe, timestamps are strictly increasing with no
/// duplicates. Bars are immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Kind-specific payload (empty for plain instruments).
    pub ext: BarExt,
}

/// Kind-specific bar columns, carried as a closed variant payload rather
/// than a subtype of `Bar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BarExt {
    None,
    Fx(FxFields),
}

/// Extra columns a foreign-exchange feed reports alongside OHLCV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FxFields {
    pub spread: f64,
    pub tick_volume: f64,
    pub trade_volume: f64,
    pub swap: f64,
}

impl Bar {
    pub fn plain(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self { timestamp, open, high, low, close, volume, ext: BarExt::None }
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: the high/low range must bracket open and close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// The FX payload, if this bar carries one.
    pub fn fx(&self) -> Option<&FxFields> {
        match &self.ext {
            BarExt::Fx(fields) => Some(fields),
            BarExt::None => None,
        }
    }
}
