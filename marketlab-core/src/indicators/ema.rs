//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * src[t] + (1 - alpha) * EMA[t-1],
//! alpha = 2 / (period + 1). Seed: EMA[period-1] = SMA of the first
//! `period` source values. Lookback: period - 1.

use super::{IndicatorInput, IndicatorSpec, Source};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    source: Source,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self::over(period, Source::close())
    }

    pub fn over(period: usize, source: Source) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        let name = match &source {
            Source::Field(super::Field::Close) => format!("ema_{period}"),
            other => format!("ema_{period}_{other}"),
        };
        Self { period, source, name }
    }
}

impl IndicatorSpec for Ema {
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
        let alpha = 2.0 / (self.period as f64 + 1.0);
        for i in out.len()..input.len() {
            let value = if i + 1 < self.period {
                f64::NAN
            } else if i + 1 == self.period {
                // Seed: SMA of the first `period` values.
                let mut sum = 0.0;
                for j in 0..self.period {
                    sum += input.value(&self.source, j);
                }
                sum / self.period as f64
            } else {
                let prev = out[i - 1];
                alpha * input.value(&self.source, i) + (1.0 - alpha) * prev
            };
            out.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, extend_over, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_seeds_with_sma() {
        let bars = make_bars(&[10.0, 12.0, 14.0, 16.0]);
        let result = extend_over(&Ema::new(3), &bars);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        // Seed = mean(10, 12, 14) = 12
        assert_approx(result[2], 12.0, DEFAULT_EPSILON);
        // alpha = 0.5: 0.5*16 + 0.5*12 = 14
        assert_approx(result[3], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_1_is_source() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = extend_over(&Ema::new(1), &bars);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_nan_in_seed_taints_downstream() {
        let mut bars = make_bars(&[10.0, 12.0, 14.0, 16.0, 18.0]);
        bars[1].close = f64::NAN;
        let result = extend_over(&Ema::new(3), &bars);
        // NaN seed propagates through the recursion.
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
    }

    #[test]
    fn ema_incremental_equals_batch() {
        let bars = make_bars(&[10.0, 11.0, 9.0, 12.0, 13.0, 11.5, 10.0, 14.0]);
        let ema = Ema::new(4);

        let batch = extend_over(&ema, &bars);

        let mut incremental = Vec::new();
        for split in 1..=bars.len() {
            let input = crate::indicators::IndicatorInput::new(
                &bars[..split],
                std::collections::HashMap::new(),
            );
            ema.extend(&input, &mut incremental);
        }

        for (b, i) in batch.iter().zip(&incremental) {
            assert!(b.to_bits() == i.to_bits(), "batch={b}, incremental={i}");
        }
    }
}
