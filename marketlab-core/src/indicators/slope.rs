//! Rolling least-squares slope of a source series.
//!
//! Fits y = a*x + b over the last `window` points (x = chronological bar
//! index) and reports a. Typically attached on top of an SMA to read the
//! local trend of the smoothed series. NaN while the window is incomplete
//! or while the upstream is still warming up.

use super::{IndicatorInput, IndicatorSpec, Source};

#[derive(Debug, Clone)]
pub struct WindowSlope {
    window: usize,
    source: Source,
    name: String,
}

impl WindowSlope {
    pub fn over(window: usize, source: Source) -> Self {
        assert!(window >= 2, "slope window must be >= 2");
        let name = format!("slope_{window}_{source}");
        Self { window, source, name }
    }
}

impl IndicatorSpec for WindowSlope {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<Source> {
        vec![self.source.clone()]
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn extend(&self, input: &IndicatorInput<'_>, out: &mut Vec<f64>) {
        let w = self.window as f64;
        for i in out.len()..input.len() {
            if i + 1 < self.window {
                out.push(f64::NAN);
                continue;
            }
            let mut sx = 0.0;
            let mut sy = 0.0;
            let mut sx2 = 0.0;
            let mut sxy = 0.0;
            for j in (i + 1 - self.window)..=i {
                let x = j as f64;
                let y = input.value(&self.source, j);
                sx += x;
                sy += y;
                sx2 += x * x;
                sxy += x * y;
            }
            out.push((w * sxy - sx * sy) / (w * sx2 - sx * sx));
        }
    }
}
