//! Bollinger band over the typical price.
//!
//! band[t] = mean(tp, n) + sigma * std(tp, n), where tp = (high+low+close)/3
//! and std is the sample standard deviation (ddof = 1). A positive sigma
//! gives the upper band, a negative one the lower band; sigma = 0 is the
//! middle band. Lookback: period - 1.

use super::{Field, IndicatorInput, IndicatorSpec, Source};

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    sigma: f64,
    name: String,
}

impl Bollinger {
    pub fn upper(period: usize, sigma: f64) -> Self {
        assert!(sigma > 0.0, "upper band sigma must be positive");
        Self::with_sigma(period, sigma, format!("boll_up_{period}"))
    }

    pub fn lower(period: usize, sigma: f64) -> Self {
        assert!(sigma > 0.0, "lower band sigma must be positive");
        Self::with_sigma(period, -sigma, format!("boll_dn_{period}"))
    }

    pub fn middle(period: usize) -> Self {
        Self::with_sigma(period, 0.0, format!("boll_mid_{period}"))
    }

    fn with_sigma(period: usize, sigma: f64, name: String) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        Self { period, sigma, name }
    }

    fn typical_price(input: &IndicatorInput<'_>, i: usize) -> f64 {
        let bar = input.bar(i);
        (bar.high + bar.low + bar.close) / 3.0
    }
}

impl IndicatorSpec for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<Source> {
        vec![
            Source::Field(Field::High),
            Source::Field(Field::Low),
            Source::Field(Field::Close),
        ]
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn extend(&self, input: &IndicatorInput<'_>, out: &mut Vec<f64>) {
        let n = self.period as f64;
        for i in out.len()..input.len() {
            if i + 1 < self.period {
                out.push(f64::NAN);
                continue;
            }
            let window = (i + 1 - self.period)..=i;
            let mut sum = 0.0;
            for j in window.clone() {
                sum += Self::typical_price(input, j);
            }
            let mean = sum / n;
            let mut sq = 0.0;
            for j in window {
                let d = Self::typical_price(input, j) - mean;
                sq += d * d;
            }
            let std = (sq / (n - 1.0)).sqrt();
            out.push(mean + self.sigma * std);
        }
    }
}
