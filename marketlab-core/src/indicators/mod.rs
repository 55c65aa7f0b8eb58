//! Indicator engine: derived series computed incrementally over a timeframe.
//!
//! An indicator declares its inputs (raw bar fields and/or other indicators
//! on the same timeframe) and extends its output series whenever new bars
//! arrive. Extension is append-only over the newly available index range,
//! and must produce exactly the values a from-scratch recomputation would:
//! an indicator value at index i is a pure function of data at indices <= i.
//!
//! Insufficient history yields `f64::NAN` for that index, never an error.

pub mod bollinger;
pub mod ema;
pub mod slope;
pub mod sma;

pub use bollinger::Bollinger;
pub use ema::Ema;
pub use slope::WindowSlope;
pub use sma::Sma;

use crate::domain::Bar;
use std::collections::HashMap;
use std::fmt;

/// A raw bar field an indicator can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }

    pub fn of(&self, bar: &Bar) -> f64 {
        match self {
            Field::Open => bar.open,
            Field::High => bar.high,
            Field::Low => bar.low,
            Field::Close => bar.close,
            Field::Volume => bar.volume,
        }
    }
}

/// A declared indicator input: a raw field or an upstream indicator
/// attached to the same timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Field(Field),
    Indicator(String),
}

impl Source {
    pub fn close() -> Self {
        Source::Field(Field::Close)
    }

    pub fn indicator(name: impl Into<String>) -> Self {
        Source::Indicator(name.into())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Field(field) => write!(f, "{}", field.name()),
            Source::Indicator(name) => write!(f, "{name}"),
        }
    }
}

/// Read-only view of a timeframe handed to an indicator during extension:
/// the full bar series plus the resolved series of its declared upstream
/// indicators. Indexing is chronological (0 = oldest).
pub struct IndicatorInput<'a> {
    bars: &'a [Bar],
    upstream: HashMap<String, &'a [f64]>,
}

impl<'a> IndicatorInput<'a> {
    pub fn new(bars: &'a [Bar], upstream: HashMap<String, &'a [f64]>) -> Self {
        Self { bars, upstream }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, i: usize) -> &Bar {
        &self.bars[i]
    }

    /// Value of a source at chronological index `i`. An upstream indicator
    /// that was never declared reads as NaN; attach-time resolution makes
    /// that unreachable for well-formed specs.
    pub fn value(&self, source: &Source, i: usize) -> f64 {
        match source {
            Source::Field(field) => field.of(&self.bars[i]),
            Source::Indicator(name) => self
                .upstream
                .get(name.as_str())
                .and_then(|series| series.get(i).copied())
                .unwrap_or(f64::NAN),
        }
    }
}

/// Trait for indicator computations.
///
/// `extend` appends values for chronological indices `out.len()..input.len()`
/// only; earlier values are never rewritten. Every implementation must
/// produce identical series whether extended bar by bar or in one batch.
pub trait IndicatorSpec: Send + Sync {
    /// Name this indicator is registered under (e.g. "sma_20").
    fn name(&self) -> &str;

    /// Declared inputs; upstream indicators must already be attached.
    fn inputs(&self) -> Vec<Source>;

    /// Number of bars consumed before the first non-NaN output.
    fn lookback(&self) -> usize;

    /// Append values for the newly available index range.
    fn extend(&self, input: &IndicatorInput<'_>, out: &mut Vec<f64>);
}

/// Create synthetic bars from close prices for testing.
///
/// Minute-spaced timestamps; open = previous close, high/low bracket both.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::plain(
                base + Duration::minutes(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1_000.0,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Extend an indicator over bars with no upstream series, for tests.
#[cfg(test)]
pub fn extend_over(spec: &dyn IndicatorSpec, bars: &[Bar]) -> Vec<f64> {
    let input = IndicatorInput::new(bars, HashMap::new());
    let mut out = Vec::new();
    spec.extend(&input, &mut out);
    out
}
