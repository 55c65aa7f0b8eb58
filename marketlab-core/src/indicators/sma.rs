//! Simple Moving Average (SMA).
//!
//! Rolling mean of a source over a lookback window. The source defaults to
//! close but may be any field or upstream indicator, which is how
//! indicator-on-indicator chains (e.g. slope of SMA) are built.
//! Lookback: period - 1 (first valid value at chronological index period-1).

use super::{IndicatorInput, IndicatorSpec, Source};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: Source,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self::over(period, Source::close())
    }

    pub fn over(period: usize, source: Source) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let name = match &source {
            Source::Field(super::Field::Close) => format!("sma_{period}"),
            other => format!("sma_{period}_{other}"),
        };
        Self { period, source, name }
    }
}

impl IndicatorSpec for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<Source> {
        vec![self.source.clone()]
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn extend(&self, input: &IndicatorInput<'_>, out: &mut Vec<f64>) {
        for i in out.len()..input.len() {
            if i + 1 < self.period {
                out.push(f64::NAN);
                continue;
            }
            // Window mean recomputed per bar: exact equality between
            // incremental and batch extension requires the same summation
            // order at every index.
            let mut sum = 0.0;
            for j in (i + 1 - self.period)..=i {
                sum += input.value(&self.source, j);
            }
            out.push(sum / self.period as f64);
        }
    }
}
